use anyhow::bail;
use clap::{ArgAction, Parser};
use mp4tree::{BoxRef, NodeKind, find_path, json::to_json_string, parse_file};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "MP4/ISOBMFF box tree decoder")]
struct Args {
    /// MP4/ISOBMFF file path
    path: String,

    /// Only print the subtree at a dotted path (e.g. moov.trak[0].mdia.minf.stbl)
    #[arg(long = "filter")]
    filter: Option<String>,

    /// Limit printed depth (text output only)
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Print decoded fields under each box
    #[arg(long, action = ArgAction::SetTrue)]
    fields: bool,

    /// Emit JSON instead of a human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "mp4tree=debug" } else { "mp4tree=warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let top = parse_file(&args.path)?;

    let targets: Vec<&BoxRef> = match &args.filter {
        Some(path) => match find_path(&top, path) {
            Some(b) => vec![b],
            None => bail!("no box at path {path}"),
        },
        None => top.iter().collect(),
    };

    if args.json {
        let owned: Vec<BoxRef> = targets.into_iter().cloned().collect();
        println!("{}", to_json_string(&owned)?);
        return Ok(());
    }

    for b in targets {
        print_box(b, 0, args.max_depth, args.fields);
    }
    Ok(())
}

fn print_box(b: &BoxRef, depth: usize, max_depth: usize, fields: bool) {
    let indent = "  ".repeat(depth);
    let label = match &b.kind {
        NodeKind::Decoded { name } => name.to_string(),
        NodeKind::Unknown => "unknown".to_string(),
        NodeKind::Damaged { reason } => format!("damaged: {reason}"),
    };
    let label = if b.truncated {
        format!("{label}, truncated")
    } else {
        label
    };
    let typ = match b.hdr.uuid {
        Some(u) => format!("uuid:{}", hex::encode(u)),
        None => b.typ().to_string(),
    };
    match b.full {
        Some(fb) => println!(
            "{indent}{:>8} {:>10} {} [{}] (ver={}, flags=0x{:06x})",
            format!("{:#x}", b.start_offset()),
            b.size,
            typ,
            label,
            fb.version,
            fb.flags
        ),
        None => println!(
            "{indent}{:>8} {:>10} {} [{}]",
            format!("{:#x}", b.start_offset()),
            b.size,
            typ,
            label
        ),
    }

    if fields {
        for (k, v) in b.field_summary() {
            println!("{indent}           -> {k} = {v}");
        }
    }

    if depth < max_depth {
        for c in b.children() {
            print_box(c, depth + 1, max_depth, fields);
        }
    }
}
