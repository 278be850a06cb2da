use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 验证码截图临时文件
///
/// 离开作用域时删除文件，成功、失败和提前返回的路径都一样。
#[derive(Debug)]
pub struct ScreenshotFile {
    path: PathBuf,
}

impl ScreenshotFile {
    /// 在 `dir` 下分配一个唯一文件名（文件本身由截图操作写入）
    pub fn allocate(dir: &Path, registration_number: &str) -> Self {
        let file_name = format!(
            "{}_{}.png",
            sanitize_file_stem(registration_number),
            uuid::Uuid::new_v4().simple()
        );
        Self {
            path: dir.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScreenshotFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("已删除截图: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("删除截图失败 {}: {}", self.path.display(), e),
        }
    }
}

fn sanitize_file_stem(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
