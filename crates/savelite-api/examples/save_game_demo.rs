//! Demonstrates saving, reloading and recovering a game state.
//!
//! Run with: cargo run -p savelite --example save_game_demo

use savelite::{CompressionMethod, EncryptionMethod, Persistence, Settings};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct Player {
    name: String,
    level: u32,
    gold: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root = "./demo_saves";

    println!("=== SaveLite Save Game Demo ===\n");

    if Path::new(root).exists() {
        std::fs::remove_dir_all(root)?;
        println!("🧹 Cleaned up previous demo saves\n");
    }

    let settings = Settings::new()
        .with_root(root)
        .with_profile("player-one")
        .with_max_backups(2)
        .with_compression(CompressionMethod::GZip)
        .with_encryption(EncryptionMethod::Aes)
        .with_passphrase("demo passphrase");

    // PART 1: First launch, nothing on disk yet
    println!("📝 PART 1: Creating a new save...");
    {
        let saves = Persistence::new(settings.clone())?;
        let report = saves.load(true, true).wait()?;
        println!("   not found on first launch: {}", report.not_found);

        saves.write(
            "player",
            &Player {
                name: "Aria".to_string(),
                level: 7,
                gold: 420,
            },
        )?;
        saves.write("checkpoint", "forest-gate")?;

        let report = saves.flush().wait()?;
        println!("   ✅ Flushed, {} backups on disk", report.backup_count);
        println!("   📁 Written to: {}", saves.primary_path()?.display());
    }

    // PART 2: A later session reads it back
    println!("\n📖 PART 2: Loading the save...");
    {
        let saves = Persistence::new(settings.clone())?;
        let report = saves.load(false, false).wait()?;
        if let Some(problem) = report.problem {
            return Err(problem.into());
        }
        let player: Player = saves.read("player")?;
        println!("   ✅ Loaded {:?}", player);
        println!("   checkpoint: {}", saves.read::<String>("checkpoint")?);
    }

    // PART 3: The primary file gets damaged; fall back to a backup
    println!("\n🩹 PART 3: Recovering from a damaged save...");
    {
        let saves = Persistence::new(settings)?;
        std::fs::write(saves.primary_path()?, "damaged")?;

        let report = saves.load(false, false).wait()?;
        println!("   primary load problem: {:?}", report.problem.map(|e| e.kind()));

        let report = saves.load_backup(false, false).wait()?;
        println!(
            "   ✅ Restored from backup slot {:?}",
            report.backup_index
        );
        println!("   player: {:?}", saves.read::<Player>("player")?);

        let reports = saves.purge().wait()?;
        println!("   🧹 Purged {} files", reports.len());
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
