// 待上传文件暂存
//
// 拖放或文件选择器每次交付一组文件，新的一组整体替换之前未提交的文件

use crate::error::UploadError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 文件内容来源
#[derive(Debug, Clone)]
pub enum FileContent {
    /// 本地文件，上传时流式读取
    Path(PathBuf),
    /// 内存数据
    Bytes(Bytes),
}

/// 待上传文件
#[derive(Debug, Clone)]
pub struct StagedFile {
    /// 上传时使用的文件名
    pub name: String,
    /// 文件大小（字节）
    pub size: u64,
    pub content: FileContent,
}

impl StagedFile {
    /// 从本地路径创建，读取文件元数据
    pub async fn from_path(path: impl Into<PathBuf>) -> Result<Self, UploadError> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| UploadError::io(&path, e))?;

        if !metadata.is_file() {
            return Err(UploadError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "不是普通文件"),
            ));
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                UploadError::io(
                    &path,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "无法获取文件名"),
                )
            })?;

        Ok(Self {
            name,
            size: metadata.len(),
            content: FileContent::Path(path),
        })
    }

    /// 从内存数据创建
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            content: FileContent::Bytes(data),
        }
    }
}

/// 文件来源事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SelectionSource {
    /// 拖放
    Drop,
    /// 文件选择器
    Picker,
}

/// 一次拖放或选择交付的文件集合
#[derive(Debug, Clone)]
pub struct FileSelection {
    pub source: SelectionSource,
    pub files: Vec<StagedFile>,
}

impl FileSelection {
    pub fn dropped(files: Vec<StagedFile>) -> Self {
        Self {
            source: SelectionSource::Drop,
            files,
        }
    }

    pub fn picked(files: Vec<StagedFile>) -> Self {
        Self {
            source: SelectionSource::Picker,
            files,
        }
    }

    /// 从本地路径批量创建选择器事件
    pub async fn pick_paths<I, P>(paths: I) -> Result<Self, UploadError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut files = Vec::new();
        for path in paths {
            files.push(StagedFile::from_path(path).await?);
        }
        Ok(Self::picked(files))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// 当前暂存的文件集合
#[derive(Debug, Clone, Default)]
pub struct StagedFiles {
    files: Vec<StagedFile>,
}

impl StagedFiles {
    /// 整体替换，不与之前的文件合并
    pub fn replace(&mut self, files: Vec<StagedFile>) {
        self.files = files;
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedFile> {
        self.files.iter()
    }

    /// 复制当前文件列表，用于发起上传
    pub fn snapshot(&self) -> Vec<StagedFile> {
        self.files.clone()
    }
}

/// 上传按钮文本，数量为 0 时返回 None
pub fn upload_button_label(count: usize) -> Option<String> {
    match count {
        0 => None,
        1 => Some("Upload 1 file".to_string()),
        n => Some(format!("Upload {} files", n)),
    }
}
