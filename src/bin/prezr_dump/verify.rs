use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use indoc::indoc;
use log::info;
use prezr::{
    BitmapArena, ExpectedTag, FileStorage, LoaderSettings, Pack, PackLoader, ResourceStorage,
    SystemAllocator,
};
use std::path::PathBuf;

const RESOURCE_ID: u32 = 1;

pub fn command() -> Command {
    Command::new("verify")
        .about("Load a pack the way a client would and bind every bitmap")
        .long_about(indoc!(r#"
            Load a pack the way a client would and bind every bitmap.

            Every payload must be a bitmap record whose size matches its table entry.
            The pack is always destroyed afterwards; the exit code is non-zero if any
            step of the load failed.
        "#))
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("PACK")
                .help("Path to a pack blob."),
        )
        .arg(
            Arg::new("expected-tag")
                .long("expected-tag")
                .value_name("TAG")
                .value_parser(parse_tag)
                .help("Fail unless the pack tag equals TAG (decimal or 0x-prefixed hex). 0 skips the check."),
        )
        .arg(
            Arg::new("heap-budget")
                .long("heap-budget")
                .value_name("BYTES")
                .value_parser(clap::value_parser!(usize))
                .help("Fail allocations that would exceed BYTES."),
        )
        .arg(
            Arg::new("borrowed")
                .long("borrowed")
                .action(ArgAction::SetTrue)
                .help("Load into a caller-supplied container instead of an owned buffer."),
        )
}

fn parse_tag(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid tag `{s}`: {e}"))
}

pub fn run(matches: &ArgMatches) -> Result<()> {
    let path = PathBuf::from(
        matches
            .get_one::<String>("input")
            .expect("required argument"),
    );
    let expected_tag = matches
        .get_one::<u32>("expected-tag")
        .map_or(ExpectedTag::Skip, |tag| ExpectedTag::from(*tag));
    let allocator = match matches.get_one::<usize>("heap-budget") {
        Some(budget) => SystemAllocator::with_budget(*budget),
        None => SystemAllocator::new(),
    };

    let storage = FileStorage::new().with_resource(RESOURCE_ID, &path);
    if storage.size(RESOURCE_ID) == 0 {
        bail!("`{}` is missing or empty", path.display());
    }

    let settings = LoaderSettings::new().expected_tag(expected_tag);
    let mut loader =
        PackLoader::new(storage, allocator, BitmapArena::new()).with_configuration(settings);

    if matches.get_flag("borrowed") {
        let mut container = vec![0u8; loader.storage().size(RESOURCE_ID)];
        let mut pack = Pack::new();
        let result = loader.init_borrowed(&mut pack, RESOURCE_ID, &mut container);
        finish(&mut loader, &mut pack, result, &path)
    } else {
        let mut pack = Pack::new();
        let result = loader.init_owned(&mut pack, RESOURCE_ID, expected_tag);
        finish(&mut loader, &mut pack, result, &path)
    }
}

fn finish(
    loader: &mut PackLoader<FileStorage, SystemAllocator, BitmapArena>,
    pack: &mut Pack<'_, prezr::BitmapHandle>,
    result: prezr::Result<()>,
    path: &std::path::Path,
) -> Result<()> {
    let bound = pack.bound_count();
    let total = pack.header().map_or(0, |h| h.resource_count);

    loader.destroy(pack);
    info!(
        "released {} bitmaps, {} bytes still allocated",
        loader.binder().release_count(),
        loader.allocator().stats().bytes_in_use
    );

    result.with_context(|| format!("failed to load `{}` ({bound} of {total} bitmaps bound)", path.display()))?;

    println!("ok: {bound} of {total} bitmaps bound");
    Ok(())
}
