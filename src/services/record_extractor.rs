//! 记录提取服务 - 业务能力层
//!
//! 从详情页 HTML 中提取项目名称和投诉列表。页面缺少区块属于正常情况，
//! 以 `Extraction::Incomplete` 报告，不会让调用方中断批次。

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, warn};

use crate::error::ExtractError;
use crate::models::{ComplaintRecord, ProjectDetails};

const PROJECT_NAME_LABEL: &str = "Project Name";
const COMPLAINT_SECTION_TITLE: &str = "Complaint Details";
const INDEX_COLUMN: &str = "#";
const NO_RECORDS_TEXT: &str = "No Records Found";
const COMPLAINT_NUMBER_COLUMN: &str = "Complaint No.";
const COMPLAINT_STATUS_COLUMN: &str = "Complaint Status";

/// 提取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// 完整提取（投诉列表可能为空）
    Found(ProjectDetails),
    /// 页面结构不符合预期，只保留项目名称
    Incomplete {
        project_name: Option<String>,
        error: ExtractError,
    },
}

impl Extraction {
    pub fn project_name(&self) -> Option<&str> {
        match self {
            Extraction::Found(details) => details.project_name.as_deref(),
            Extraction::Incomplete { project_name, .. } => project_name.as_deref(),
        }
    }

    pub fn complaints(&self) -> &[ComplaintRecord] {
        match self {
            Extraction::Found(details) => &details.complaints,
            Extraction::Incomplete { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&ExtractError> {
        match self {
            Extraction::Found(_) => None,
            Extraction::Incomplete { error, .. } => Some(error),
        }
    }

    /// 拆分为可写入记录的数据和可选的失败原因
    pub fn into_parts(self) -> (ProjectDetails, Option<ExtractError>) {
        match self {
            Extraction::Found(details) => (details, None),
            Extraction::Incomplete {
                project_name,
                error,
            } => (
                ProjectDetails {
                    project_name,
                    complaints: Vec::new(),
                },
                Some(error),
            ),
        }
    }
}

/// 详情页记录提取器
pub struct RecordExtractor {
    label_selector: Selector,
    row_selector: Selector,
    header_selector: Selector,
    cell_selector: Selector,
}

impl RecordExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            label_selector: compile("label")?,
            row_selector: compile("tr")?,
            header_selector: compile("th")?,
            cell_selector: compile("td")?,
        })
    }

    /// 提取项目名称和投诉列表
    ///
    /// # 参数
    /// - `html`: 完整的页面 HTML
    /// - `registration_number`: 仅用于日志
    pub fn extract(&self, html: &str, registration_number: &str) -> Extraction {
        let document = Html::parse_document(html);
        let project_name = self.project_name(&document);

        match self.complaints(&document) {
            Ok(complaints) => {
                if complaints.is_empty() {
                    debug!("[项目 {}] 没有投诉记录", registration_number);
                }
                Extraction::Found(ProjectDetails {
                    project_name,
                    complaints,
                })
            }
            Err(error) => {
                match &error {
                    ExtractError::SectionNotFound => {
                        warn!("[项目 {}] 未找到 '{}' 区块", registration_number, COMPLAINT_SECTION_TITLE)
                    }
                    other => error!("[项目 {}] {}", registration_number, other),
                }
                Extraction::Incomplete {
                    project_name,
                    error,
                }
            }
        }
    }

    /// `<label>Project Name</label>` 之后的下一个 `<label>`
    fn project_name(&self, document: &Html) -> Option<String> {
        let label = document
            .select(&self.label_selector)
            .find(|label| element_text(label) == PROJECT_NAME_LABEL)?;

        label
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|sibling| sibling.value().name() == "label")
            .map(|value| value.text().collect::<String>().trim().to_string())
            .filter(|name| !name.is_empty())
    }

    fn complaints(&self, document: &Html) -> Result<Vec<ComplaintRecord>, ExtractError> {
        let heading = document
            .tree
            .root()
            .descendants()
            .find(|node| matches!(node.value(), Node::Text(text) if text.trim() == COMPLAINT_SECTION_TITLE))
            .ok_or(ExtractError::SectionNotFound)?;

        // 标题文本 → 标题元素 → 区块容器，表格是容器之后的兄弟节点
        let table = heading
            .parent()
            .and_then(|parent| parent.parent())
            .and_then(|container| {
                container
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|sibling| sibling.value().name() == "table")
            })
            .ok_or(ExtractError::TableNotFound)?;

        let rows = self.table_rows(table);

        if let [only] = rows.as_slice() {
            if only.get(INDEX_COLUMN).map(String::as_str) == Some(NO_RECORDS_TEXT) {
                return Ok(Vec::new());
            }
        }

        rows.iter()
            .enumerate()
            .map(|(index, row)| -> Result<ComplaintRecord, ExtractError> {
                let column = |name: &str| {
                    row.get(name).cloned().ok_or_else(|| ExtractError::MalformedRow {
                        row: index + 1,
                        column: name.to_string(),
                    })
                };
                Ok(ComplaintRecord {
                    complaint_number: column(COMPLAINT_NUMBER_COLUMN)?,
                    status: column(COMPLAINT_STATUS_COLUMN)?,
                })
            })
            .collect()
    }

    /// 第一行作为表头，其余行按位置与表头对应
    fn table_rows(&self, table: ElementRef<'_>) -> Vec<HashMap<String, String>> {
        let mut rows = table.select(&self.row_selector);

        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .select(&self.header_selector)
                .map(|th| element_text(&th))
                .collect(),
            None => return Vec::new(),
        };

        rows.map(|row| {
            headers
                .iter()
                .cloned()
                .zip(row.select(&self.cell_selector).map(|td| element_text(&td)))
                .collect()
        })
        .collect()
    }
}

/// 各文本片段去掉首尾空白后拼接
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect()
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("无法编译选择器 '{}': {:?}", selector, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> String {
        format!(
            r#"<html><body>
            <div class="row">
                <label>Project Name </label>
                <label> Sunrise Heights </label>
            </div>
            {}
            </body></html>"#,
            body
        )
    }

    fn complaint_section(rows: &str) -> String {
        format!(
            r#"<div class="card-header"><h5>Complaint Details</h5></div>
            <table class="table">
                <tr><th>#</th><th>Complaint No.</th><th>Complaint Status</th></tr>
                {}
            </table>"#,
            rows
        )
    }

    fn extract(html: &str) -> Extraction {
        RecordExtractor::new().unwrap().extract(html, "P1")
    }

    #[test]
    fn test_extracts_name_and_complaints() {
        let html = page(&complaint_section(
            "<tr><td>1</td><td>C100</td><td>Open</td></tr>\
             <tr><td>2</td><td> C101 </td><td>Disposed</td></tr>",
        ));

        let extraction = extract(&html);
        assert_eq!(extraction.project_name(), Some("Sunrise Heights"));
        assert_eq!(
            extraction.complaints(),
            &[
                ComplaintRecord::new("C100", "Open"),
                ComplaintRecord::new("C101", "Disposed"),
            ]
        );
        assert!(extraction.error().is_none());
    }

    #[test]
    fn test_no_records_found_row_is_empty_success() {
        let html = page(&complaint_section(
            r#"<tr><td colspan="3">No Records Found</td></tr>"#,
        ));

        let extraction = extract(&html);
        assert_eq!(
            extraction,
            Extraction::Found(ProjectDetails {
                project_name: Some("Sunrise Heights".to_string()),
                complaints: Vec::new(),
            })
        );
    }

    #[test]
    fn test_missing_section_keeps_project_name() {
        let extraction = extract(&page("<p>Nothing here</p>"));
        assert_eq!(extraction.error(), Some(&ExtractError::SectionNotFound));
        assert_eq!(extraction.project_name(), Some("Sunrise Heights"));
        assert!(extraction.complaints().is_empty());
    }

    #[test]
    fn test_missing_table_is_reported() {
        let html = page(r#"<div><h5>Complaint Details</h5></div><p>no table</p>"#);
        assert_eq!(extract(&html).error(), Some(&ExtractError::TableNotFound));
    }

    #[test]
    fn test_row_missing_status_fails_whole_record() {
        let html = page(&complaint_section(
            "<tr><td>1</td><td>C100</td><td>Open</td></tr>\
             <tr><td>2</td><td>C101</td></tr>",
        ));

        let (details, error) = extract(&html).into_parts();
        assert_eq!(
            error,
            Some(ExtractError::MalformedRow {
                row: 2,
                column: "Complaint Status".to_string()
            })
        );
        assert!(details.complaints.is_empty());
        assert_eq!(details.project_name.as_deref(), Some("Sunrise Heights"));
    }

    #[test]
    fn test_missing_project_name_is_not_an_error() {
        let html = format!("<html><body>{}</body></html>", complaint_section(""));
        let extraction = extract(&html);
        assert_eq!(extraction.project_name(), None);
        assert!(extraction.error().is_none());
        assert!(extraction.complaints().is_empty());
    }
}
