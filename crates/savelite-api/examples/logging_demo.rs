use savelite::logging::LogConfig;
use savelite::{Persistence, Settings};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (debug level, compact output to stdout)
    let _guard = LogConfig::debug().init()?;

    println!("=== SaveLite Logging Demo ===\n");

    let dir = std::env::temp_dir().join("savelite-logging-demo");
    // Engine creation logs "opening persistence engine"
    let saves = Persistence::new(Settings::new().with_root(&dir).with_max_backups(1))?;

    // Listener faults are logged as warnings and routed here
    saves
        .events()
        .on_fault(|fault| println!("fault: {}", fault));
    saves.events().on_flush(|_| Err("listener failure for the demo".into()));

    println!("\n1. Loading (file is missing)...");
    saves.load(true, true).wait()?;

    println!("\n2. Writing and flushing...");
    saves.write("greeting", "hello")?;
    saves.flush().wait()?;

    println!("\n3. Deleting an out-of-range backup...");
    saves.delete_backup(5).wait()?;

    println!("\n4. Purging...");
    saves.purge().wait()?;

    println!("\n=== Demo Complete ===");
    println!("Check the logs above to see tracing output!");

    Ok(())
}
