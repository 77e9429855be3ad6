// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text or JSON rendering of command results

use std::fmt::Display;

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    Text,
    /// Pretty-printed JSON, the same shapes the daemon sends
    Json,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print<T: Serialize + Display>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => print_json(value)?,
    }
    Ok(())
}

/// One line per item in text mode; `empty` stands in for an empty list
pub fn print_list<T: Serialize + Display>(
    items: &[T],
    format: OutputFormat,
    empty: &str,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(items)?,
        OutputFormat::Text if items.is_empty() => println!("{}", empty),
        OutputFormat::Text => items.iter().for_each(|item| println!("{}", item)),
    }
    Ok(())
}
