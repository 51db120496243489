//! `ocrdesk history` subcommands.
//!
//! Indices are display indices: 0 is the newest item, as printed by `history list`.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Subcommand;
use ocrdesk::{HistoryItem, HistoryStore, OcrDeskConfig};

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List items, newest first
    List {
        /// Only items recorded on this UTC date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print one item in full
    Show { index: usize },
    /// Replace an item's text with the contents of a file
    Edit { index: usize, text_file: PathBuf },
    /// Delete one item
    Delete { index: usize },
    /// Delete every item and stored image
    Clear,
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    let mut preview: String = line.chars().take(60).collect();
    if line.chars().count() > 60 || text.lines().count() > 1 {
        preview.push_str("...");
    }
    preview
}

fn print_row(index: usize, item: &HistoryItem) {
    println!(
        "{:>4}  {}  {:<4} {:>6.2}s  {}",
        index,
        item.timestamp.format("%Y-%m-%d %H:%M:%S"),
        item.language,
        item.processing_time,
        preview(&item.text)
    );
}

pub fn run(config: &OcrDeskConfig, command: HistoryCommands) -> Result<()> {
    let history = HistoryStore::open(config.storage.history_dir())?;

    match command {
        HistoryCommands::List { date } => {
            let items = history.display_items();
            if items.is_empty() {
                println!("History is empty");
            }
            for (index, item) in items.iter().enumerate() {
                if date.is_none_or(|d| item.timestamp.date_naive() == d) {
                    print_row(index, item);
                }
            }
        }
        HistoryCommands::Show { index } => {
            let Some(item) = history.get(index) else {
                bail!("No history item at index {}", index);
            };
            println!("Time:     {}", item.timestamp.to_rfc3339());
            println!("Language: {}", item.language);
            println!("Duration: {:.2}s", item.processing_time);
            match history.image_path(&item) {
                Some(path) => println!("Image:    {}", path.display()),
                None => println!("Image:    {} (invalid reference)", item.image_file),
            }
            println!();
            println!("{}", item.text);
        }
        HistoryCommands::Edit { index, text_file } => {
            let text = std::fs::read_to_string(&text_file)
                .with_context(|| format!("Failed to read {}", text_file.display()))?;
            if history.update_text(index, text)?.is_none() {
                bail!("No history item at index {}", index);
            }
            eprintln!("Updated item {}", index);
        }
        HistoryCommands::Delete { index } => match history.delete(index)? {
            Some(item) => eprintln!("Deleted item {} ({})", index, item.image_file),
            None => eprintln!("No history item at index {}, nothing deleted", index),
        },
        HistoryCommands::Clear => {
            let removed = history.clear()?;
            eprintln!("Removed {} item(s)", removed);
        }
    }

    Ok(())
}
