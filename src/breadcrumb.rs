//! 面包屑导航
//!
//! 把上传目录拆分为路径段，生成 `Home / a / b / c` 形式的导航：
//! 除最后一段外每段都链接到对应的 `?dir=` 目录，最后一段只显示文本

use crate::location::{dir_link, ROOT_DIR};
use serde::Serialize;

/// 首页条目文本
pub const HOME_LABEL: &str = "Home";

/// 按 `/` 拆分路径，丢弃空段
pub fn path_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// 面包屑条目
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Breadcrumb {
    /// 显示文本
    pub label: String,
    /// 链接地址，最后一段为 None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl Breadcrumb {
    fn link(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: Some(href.into()),
        }
    }

    fn plain(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: None,
        }
    }

    pub fn is_link(&self) -> bool {
        self.href.is_some()
    }
}

/// 面包屑导航
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BreadcrumbTrail {
    entries: Vec<Breadcrumb>,
}

impl BreadcrumbTrail {
    /// 根据目录路径生成导航，首项固定为 Home
    pub fn from_path(path: &str) -> Self {
        let segments = path_segments(path);
        let mut entries = Vec::with_capacity(segments.len() + 1);
        entries.push(Breadcrumb::link(HOME_LABEL, ROOT_DIR));

        for (index, segment) in segments.iter().enumerate() {
            if index == segments.len() - 1 {
                entries.push(Breadcrumb::plain(segment.as_str()));
            } else {
                entries.push(Breadcrumb::link(
                    segment.as_str(),
                    dir_link(&segments[..=index]),
                ));
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[Breadcrumb] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 渲染为 HTML 有序列表
    pub fn render_html(&self) -> String {
        let mut html = String::from("<ol class=\"breadcrumbs\">");
        for (index, entry) in self.entries.iter().enumerate() {
            html.push_str("<li>");
            if index > 0 {
                html.push_str("/ ");
            }
            match &entry.href {
                Some(href) => html.push_str(&format!(
                    "<a href=\"{}\">{}</a>",
                    escape_html(href),
                    escape_html(&entry.label)
                )),
                None => html.push_str(&format!("<span>{}</span>", escape_html(&entry.label))),
            }
            html.push_str("</li>");
        }
        html.push_str("</ol>");
        html
    }

    /// 渲染为终端文本，如 `Home / a / b`
    pub fn render_text(&self) -> String {
        self.entries
            .iter()
            .map(|entry| entry.label.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
