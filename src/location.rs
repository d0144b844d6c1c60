// 页面地址模型
//
// 上传目录来自页面 URL 的 `dir` 查询参数，缺省为根目录 `/`

use crate::error::UploadError;
use reqwest::Url;

/// 目录查询参数名
pub const DIR_QUERY_KEY: &str = "dir";

/// 根目录
pub const ROOT_DIR: &str = "/";

/// 当前页面地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    url: Url,
}

impl PageLocation {
    pub fn from_url(url: Url) -> Self {
        Self { url }
    }

    /// 解析页面地址
    ///
    /// 支持相对地址（如 `?dir=/a`），此时基于 `base` 解析
    pub fn parse(input: &str, base: Option<&Url>) -> Result<Self, UploadError> {
        let url = match base {
            Some(base) => base.join(input),
            None => Url::parse(input),
        }
        .map_err(|e| UploadError::InvalidUrl(format!("{}: {}", input, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(UploadError::InvalidUrl(format!(
                "不支持的协议 {}: {}",
                url.scheme(),
                input
            )));
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// 上传目录
    ///
    /// 取第一个 `dir` 参数；参数存在但为空时保留空字符串
    pub fn upload_dir(&self) -> String {
        self.url
            .query_pairs()
            .find(|(key, _)| key == DIR_QUERY_KEY)
            .map(|(_, value)| value.into_owned())
            .unwrap_or_else(|| ROOT_DIR.to_string())
    }

    /// 替换上传目录，保留其它查询参数
    pub fn with_dir(&self, dir: &str) -> Self {
        let mut url = self.url.clone();
        let kept: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != DIR_QUERY_KEY)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(DIR_QUERY_KEY, dir);
        Self { url }
    }

    /// 服务器根地址（去掉路径、查询和片段）
    pub fn server_root(&self) -> Url {
        let mut root = self.url.clone();
        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);
        root
    }
}

/// 构造目录导航链接 `?dir=/a/b`
///
/// 每个路径段单独编码，保留分隔符 `/`
pub fn dir_link(segments: &[String]) -> String {
    let encoded: Vec<String> = segments
        .iter()
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("?{}=/{}", DIR_QUERY_KEY, encoded.join("/"))
}
