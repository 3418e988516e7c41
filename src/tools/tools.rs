use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use uadp_rs::binary::{DecodeCtx, EncodeCtx};
use uadp_rs::descriptor::DataTypeTable;
use uadp_rs::json::JsonCtx;
use uadp_rs::pubsub::NetworkMessage;

/// Inspect UADP PubSub NetworkMessages
#[derive(Clone, Debug, Parser)]
struct Args {
    /// input file holding one binary-encoded NetworkMessage
    #[arg(short, long)]
    input: PathBuf,
    // operation to execute
    #[command(subcommand)]
    operation: Operation,
}

#[derive(Clone, Debug, Subcommand)]
enum Operation {
    /// Decode and pretty-print the message model
    Dump,
    /// Re-encode the message as PubSub JSON on stdout
    ToJson {
        /// emit the non-reversible (human oriented) form
        #[arg(long)]
        non_reversible: bool,
    },
    /// Print the UADP size the message would re-encode to
    Size,
}

fn main() -> Result<()> {
    env_logger_init();
    let args = Args::parse();
    let data = fs::read(&args.input)
        .with_context(|| format!("unable to read {}", args.input.display()))?;

    let table = DataTypeTable::new();
    let dctx = DecodeCtx::new(&table);
    let (msg, consumed) = NetworkMessage::decode_binary(&data, &dctx)
        .map_err(|e| anyhow::anyhow!("decode failed: {e}"))?;
    if consumed != data.len() {
        log::warn!("{} trailing bytes after the message", data.len() - consumed);
    }

    match args.operation {
        Operation::Dump => {
            println!("{msg:#?}");
        }
        Operation::ToJson { non_reversible } => {
            let ctx = if non_reversible {
                JsonCtx::non_reversible(&table, &[], &[])
            } else {
                JsonCtx::reversible(&table)
            };
            let names = field_name_tables(&msg);
            let size = msg
                .calc_size_json(&names, &ctx)
                .map_err(|e| anyhow::anyhow!("json encode failed: {e}"))?;
            let mut buf = vec![0u8; size];
            let written = msg
                .encode_json(&names, &ctx, &mut buf)
                .map_err(|e| anyhow::anyhow!("json encode failed: {e}"))?;
            println!("{}", String::from_utf8_lossy(&buf[..written]));
        }
        Operation::Size => {
            let ectx = EncodeCtx::new(&table);
            println!("{}", msg.calc_size_binary(&ectx));
        }
    }
    Ok(())
}

/// UADP carries no field names, so the JSON output gets positional ones.
fn field_name_tables(msg: &NetworkMessage) -> Vec<Vec<String>> {
    use uadp_rs::pubsub::DataSetPayload;
    msg.messages
        .iter()
        .map(|m| {
            let count = match &m.payload {
                DataSetPayload::KeyFrame(fields) | DataSetPayload::Event(fields) => fields.len(),
                DataSetPayload::DeltaFrame(fields) => {
                    fields.iter().map(|f| f.index as usize + 1).max().unwrap_or(0)
                }
                DataSetPayload::KeepAlive => 0,
            };
            (0..count).map(|i| format!("Field{i}")).collect()
        })
        .collect()
}

fn env_logger_init() {
    // honor RUST_LOG-style filtering without pulling a logger crate into the
    // library; the tools binary prints to stderr
    struct StderrLog;
    impl log::Log for StderrLog {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }
        fn log(&self, record: &log::Record) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
        fn flush(&self) {}
    }
    static LOGGER: StderrLog = StderrLog;
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Warn);
}
