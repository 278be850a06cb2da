/// 常见桌面浏览器的 User-Agent
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
];

/// 配置了固定值就用它，否则随机选一个
pub fn pick_user_agent(configured: Option<&str>) -> String {
    if let Some(ua) = configured.map(str::trim).filter(|ua| !ua.is_empty()) {
        return ua.to_string();
    }
    USER_AGENTS
        .get(fastrand::usize(..USER_AGENTS.len()))
        .copied()
        .unwrap_or(USER_AGENTS[0])
        .to_string()
}
