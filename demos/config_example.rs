use service_topology::Config;

fn main() -> anyhow::Result<()> {
    println!("Service Topology Configuration Example");
    println!("======================================");

    match Config::default_config_path() {
        Ok(path) => println!("📍 Default config location: {}", path.display()),
        Err(e) => println!("❌ Error getting config path: {}", e),
    }

    // Load config (will use defaults if no file exists)
    println!("\n🔧 Loading configuration...");
    let config = Config::load()?;

    println!("✅ Configuration loaded successfully!");
    println!("📜 Traffic log: {}", config.log_path.display());
    println!("🌐 Bind address: {}", config.server.bind_address);
    println!("⏱️  Poll interval: {}ms", config.server.poll_interval_ms);
    println!("⚠️  SPOF threshold: {} callers", config.analysis.spof_threshold);
    println!("📅 Risk window: {} days", config.risk.window_days);

    if config.services.is_empty() {
        println!("🏷️  Service catalog: [EMPTY - every service scored as standard tier]");
    } else {
        for (service, criticality) in &config.services {
            println!("🏷️  {}: {:?} (SLA {:?})", service, criticality.tier, criticality.sla);
        }
    }

    Ok(())
}
