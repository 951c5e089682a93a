//! 配置加载示例
//!
//! 演示默认配置、TOML 解析、增量合并与环境变量覆盖

use livepool_config::{ConfigUpdate, PoolConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== LivePool 配置示例 ===\n");

    println!("1. 默认配置:");
    let config = PoolConfig::default();
    println!("   {}", config.summary());
    println!();

    println!("2. 从 TOML 解析:");
    let config = PoolConfig::from_toml(
        r#"
        url = "https://app.example.com/"
        session_expire = 3600
        expire_interval = 30.0

        [transport]
        retry = false
        "#,
    )?;
    println!("   {}", config.summary());
    println!("   清理间隔: {:?}", config.expire_interval());
    println!();

    println!("3. 增量合并:");
    let merged = config.merge(ConfigUpdate::new().connection_timeout(3).session_expire_on_resume(600));
    println!("   {}", merged.summary());
    println!();

    println!("4. 配置验证:");
    let invalid = merged.clone().merge(ConfigUpdate::new().url(""));
    match invalid.validate() {
        Ok(_) => println!("   ✓ 配置有效"),
        Err(e) => println!("   ✗ 配置无效: {}", e),
    }
    println!();

    println!("5. 环境变量覆盖 (LIVEPOOL_*):");
    let overridden = merged.load_with_env_override()?;
    println!("   {}", overridden.summary());

    Ok(())
}
