use kestreldb::{LogManager, MemoryEngine, StorageEngine};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Create a recovery manager over an in-memory storage engine
    println!("Creating recovery manager...");
    let engine = MemoryEngine::new();
    let mut disk = engine.clone();
    let mut manager = LogManager::new(Box::new(engine.clone()));

    println!("Recovery manager created. Starting transaction simulation...");

    // Transaction 1 updates page 7 and commits
    let lsn1 = manager.write(1, 7, 0, "hello", ".....")?;
    println!("T1 UPDATE page 7 at offset 0 -> LSN {}", lsn1);
    disk.page_write(7, 0, "hello", lsn1);
    manager.commit(1)?;
    println!("T1 COMMIT (log forced through LSN {})", lsn1 + 1);

    // Transaction 2 updates page 9 but never commits
    let lsn2 = manager.write(2, 9, 4, "world", ".....")?;
    println!("T2 UPDATE page 9 at offset 4 -> LSN {}", lsn2);
    disk.page_write(9, 4, "world", lsn2);

    // A fuzzy checkpoint records both tables and the master LSN
    manager.checkpoint()?;
    println!("Checkpoint taken, master record -> LSN {}", engine.master());

    // The engine writes page 9 back: write-ahead flush, then the page
    manager.page_flushed(9)?;

    // Crash: everything volatile is gone, the durable log survives
    println!("\n-- simulated crash --\n");
    let log = engine.log_contents();
    engine.drop_volatile_pages();
    println!("Durable log at crash time:");
    for line in log.lines() {
        println!("  {}", line);
    }

    let mut recovered = LogManager::new(Box::new(engine.clone()));
    recovered.recover(&log)?;

    println!("\nRecovery complete.");
    println!("Page 7: {:?} (committed update survives)", engine.page_text(7, 0, 5));
    println!("Page 9: {:?} (loser rolled back)", engine.page_text(9, 4, 5));
    println!(
        "Transaction table empty: {}",
        recovered.tx_table().is_empty()
    );

    Ok(())
}
