//! List commands implementation

use flashprobe_core::chip::ChipDatabase;

/// List all supported programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    println!("  dummy     - In-memory flash emulator for testing");
    println!("  serprog   - Serial Flasher Protocol (USB/serial programmer)");
    println!("  internal  - Chipset-internal flash (Intel ICH/PCH, AMD SPI100)");
    println!("  linux_spi - Linux spidev kernel driver");
    println!("  linux_mtd - Linux MTD kernel driver");
    println!();
    println!("Usage: flashprobe <command> -p <programmer>[:param=value,...]");
    println!();
    println!("Examples:");
    println!("  flashprobe probe -p internal");
    println!("  flashprobe read -p linux_spi:dev=/dev/spidev0.0 -o flash.bin");
    println!("  flashprobe write -p serprog:dev=/dev/ttyUSB0:115200 -i flash.bin");
}

/// List all supported chips from the database
pub fn list_chips(db: &ChipDatabase, vendor_filter: Option<&str>) {
    println!("Supported flash chips ({} total):", db.len());
    println!();
    println!(
        "{:<12} {:<20} {:>10} {:>10}",
        "Vendor", "Name", "Size", "JEDEC ID"
    );
    println!("{}", "-".repeat(60));

    for chip in db.iter() {
        // Apply vendor filter if specified
        if let Some(vendor) = vendor_filter {
            if !chip.vendor.to_lowercase().contains(&vendor.to_lowercase()) {
                continue;
            }
        }

        let size_str = format_size(chip.total_size);
        let jedec_str = format!("{:02X} {:04X}", chip.jedec_manufacturer, chip.jedec_device);

        println!(
            "{:<12} {:<20} {:>10} {:>10}",
            chip.vendor, chip.name, size_str, jedec_str
        );
    }
}

fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
