//! 能力协商
//!
//! 决定握手时声明的 `support` 列表。代理管理的连接额外声明
//! [`PROXY_CAPABILITY`]，服务端看到它后不再为该连接自动发布数据。

/// 支持的 DDP 协议版本，按优先级排列
pub const SUPPORTED_DDP_VERSIONS: [&str; 3] = ["1", "pre2", "pre1"];

/// 代理管理连接的能力标记
pub const PROXY_CAPABILITY: &str = "ddpproxy";

/// 生成握手时声明的能力列表
pub fn negotiate_support(auto_publish: bool) -> Vec<String> {
    let mut support: Vec<String> = SUPPORTED_DDP_VERSIONS.iter().map(|v| v.to_string()).collect();
    if !auto_publish {
        support.push(PROXY_CAPABILITY.to_string());
    }
    support
}

/// 能力列表中优先使用的协议版本
pub fn preferred_version(support: &[String]) -> &str {
    support
        .iter()
        .map(String::as_str)
        .find(|v| SUPPORTED_DDP_VERSIONS.contains(v))
        .unwrap_or(SUPPORTED_DDP_VERSIONS[0])
}
