use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use prezr::{BitmapHeader, PackHeader, PackLayout, PixelFormat};
use serde::Serialize;
use std::path::PathBuf;

pub fn command() -> Command {
    Command::new("info")
        .about("Print the header and resource table of a pack, without binding anything")
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("PACK")
                .help("Path to a pack blob."),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print one JSON object per line instead of text."),
        )
}

#[derive(Debug, Serialize)]
struct HeaderLine {
    tag: u32,
    resource_count: u32,
    size: usize,
}

#[derive(Debug, Serialize)]
struct EntryLine {
    index: usize,
    width: u16,
    height: u16,
    offset: u32,
    format: Option<PixelFormat>,
}

pub fn run(matches: &ArgMatches) -> Result<()> {
    let path = PathBuf::from(
        matches
            .get_one::<String>("input")
            .expect("required argument"),
    );
    let json = matches.get_flag("json");

    let blob =
        std::fs::read(&path).with_context(|| format!("failed to read `{}`", path.display()))?;
    let layout = PackLayout::parse(&blob)
        .with_context(|| format!("`{}` is not a valid pack", path.display()))?;

    print_header(&layout.header, blob.len(), json)?;

    let table_end = layout.table_end();
    for (index, entry) in layout.entries.iter().enumerate() {
        let offset = entry.offset as usize;
        let format = if offset >= table_end {
            blob.get(offset..)
                .and_then(BitmapHeader::parse)
                .map(|h| h.format)
        } else {
            None
        };

        let line = EntryLine {
            index,
            width: entry.width,
            height: entry.height,
            offset: entry.offset,
            format,
        };

        if json {
            println!("{}", serde_json::to_string(&line)?);
        } else {
            let format = line
                .format
                .map_or_else(|| "-".to_owned(), |f| format!("{f:?}"));
            println!(
                "{:>5}  {:>5}x{:<5}  @{:<10}  {}",
                line.index, line.width, line.height, line.offset, format
            );
        }
    }

    Ok(())
}

fn print_header(header: &PackHeader, size: usize, json: bool) -> Result<()> {
    if json {
        let line = HeaderLine {
            tag: header.tag,
            resource_count: header.resource_count,
            size,
        };
        println!("{}", serde_json::to_string(&line)?);
    } else {
        println!(
            "tag: {:#010x}, resources: {}, size: {} bytes",
            header.tag, header.resource_count, size
        );
    }
    Ok(())
}
