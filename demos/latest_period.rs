use anyhow::{Context, Result};
use dhis2::{Api, Client};

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Configure the server via env vars or a `.dhis2rc` file.
    let mut args = std::env::args().skip(1);
    let data_element = args.next().unwrap_or_else(|| "fbfJHSPpUQD".to_string());
    let level: u32 = args
        .next()
        .map(|l| l.parse())
        .transpose()
        .context("level must be a number")?
        .unwrap_or(2);

    let client = Client::from_env()?;
    let calendar = client.system().calendar()?;
    let client = client.with_calendar(calendar);

    match client.latest_period_for_level(&data_element, level)? {
        Some(found) => println!(
            "{} ({}): {} to {}, {} values",
            found.period_id, found.period_type, found.window.start, found.window.end, found.value_count
        ),
        None => println!("no data for {data_element} at level {level}"),
    }
    Ok(())
}
