use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::FailureKind;

/// 一条投诉记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintRecord {
    #[serde(rename = "Complaint No.")]
    pub complaint_number: String,
    #[serde(rename = "Complaint Status")]
    pub status: String,
}

impl ComplaintRecord {
    pub fn new(complaint_number: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            complaint_number: complaint_number.into(),
            status: status.into(),
        }
    }
}

/// 从详情页提取出的内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDetails {
    pub project_name: Option<String>,
    pub complaints: Vec<ComplaintRecord>,
}

/// 一个注册号对应的输出记录
///
/// 由输入的一行创建，解析链接后写入 `resolved_link`，提取页面后写入名称和投诉列表。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRecord {
    #[serde(rename = "Registration Number")]
    pub registration_number: String,
    #[serde(rename = "link")]
    pub resolved_link: Option<String>,
    pub project_name: Option<String>,
    #[serde(rename = "complaint_details")]
    pub complaints: Vec<ComplaintRecord>,
    /// 处理失败时记录失败类别
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureKind>,
}

impl ProjectRecord {
    pub fn new(registration_number: impl Into<String>) -> Self {
        Self {
            registration_number: registration_number.into(),
            resolved_link: None,
            project_name: None,
            complaints: Vec::new(),
            error: None,
        }
    }

    /// 写入提取结果
    pub fn apply_details(&mut self, details: ProjectDetails) {
        self.project_name = details.project_name;
        self.complaints = details.complaints;
    }

    /// 记录失败类别（保留已有的部分数据）
    pub fn mark_failed(&mut self, kind: FailureKind) {
        self.error = Some(kind);
    }
}

/// 单次验证码尝试，只在一次检索过程中存在
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaAttempt {
    /// 从 1 开始
    pub attempt_number: u32,
    pub image_path: PathBuf,
    pub solved_code: Option<String>,
    pub accepted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_with_output_keys() {
        let mut record = ProjectRecord::new("P51700003336");
        record.resolved_link = Some("https://example.test/view/1".to_string());
        record.apply_details(ProjectDetails {
            project_name: Some("Sunrise Heights".to_string()),
            complaints: vec![ComplaintRecord::new("C100", "Open")],
        });

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["Registration Number"], "P51700003336");
        assert_eq!(value["link"], "https://example.test/view/1");
        assert_eq!(value["project_name"], "Sunrise Heights");
        assert_eq!(value["complaint_details"][0]["Complaint No."], "C100");
        assert_eq!(value["complaint_details"][0]["Complaint Status"], "Open");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_failed_record_keeps_partial_data() {
        let mut record = ProjectRecord::new("P1");
        record.apply_details(ProjectDetails {
            project_name: Some("Name".to_string()),
            complaints: Vec::new(),
        });
        record.mark_failed(FailureKind::SectionNotFound);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["project_name"], "Name");
        assert_eq!(value["error"], "section_not_found");
        assert!(value["link"].is_null());
    }
}
