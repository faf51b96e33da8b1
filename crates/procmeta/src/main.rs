use std::fs;
use std::process;

use clap::{Parser, Subcommand};
use procmeta_core::addrinfo::{AddressInfo, InfoFlags};
use procmeta_core::modules::header::inspect_image;
use procmeta_core::types::Address;
use procmeta_core::{DebugSession, ProcmetaError, Result as ProcmetaResult, SessionOptions};
use procmeta_utils::{init_logging, EnvConfig, LogConfig, LogFormat, LogLevel};

/// Module, memory map and address metadata of live processes.
#[derive(Parser, Debug)]
#[command(name = "procmeta")]
#[command(version)]
#[command(about = "Module, memory map and address metadata of live processes", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,

    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format: pretty or json (overrides PROCMETA_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Skip symbol table and DWARF loading
    #[arg(long, global = true, default_value_t = false)]
    no_symbols: bool,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Print the entry point, sections and exports of a binary on disk
    Inspect
    {
        /// Path to the binary
        file: String,
        /// Load address to relocate to (hex format: 0x1000 or decimal)
        #[arg(long, default_value = "0")]
        base: String,
    },
    /// List the modules mapped into a process
    Modules
    {
        /// Process ID (PID)
        pid: i32,
    },
    /// List the committed memory regions of a process
    Map
    {
        /// Process ID (PID)
        pid: i32,
    },
    /// Resolve addresses in a process to module, label and source line
    Resolve
    {
        /// Process ID (PID)
        pid: i32,
        /// Addresses (hex format: 0x1000 or decimal)
        #[arg(required = true)]
        addresses: Vec<String>,
    },
}

fn main()
{
    let cli = Cli::parse();
    let env = EnvConfig::from_env();

    let mut log = LogConfig::from_env(&env);
    log.level = cli.log_level;
    if let Some(format) = cli.log_format {
        log.format = format;
    }
    let _guard = match init_logging(&log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    let options = SessionOptions {
        label_virtual_modules: !env.no_export_labels,
        load_debug_symbols: !(cli.no_symbols || env.no_symbols),
    };

    if let Err(e) = run_command(cli.command, options) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Commands, options: SessionOptions) -> ProcmetaResult<()>
{
    match command {
        Commands::Inspect { file, base } => inspect(&file, parse_address(&base)?),
        Commands::Modules { pid } => {
            let session = open_session(pid, options)?;
            print_modules(&session);
            Ok(())
        }
        Commands::Map { pid } => {
            let session = open_session(pid, options)?;
            print_memory_map(&session);
            Ok(())
        }
        Commands::Resolve { pid, addresses } => {
            let addresses = addresses
                .iter()
                .map(|text| parse_address(text))
                .collect::<ProcmetaResult<Vec<_>>>()?;
            let session = open_session(pid, options)?;
            for address in addresses {
                print_address_info(&session, address);
            }
            Ok(())
        }
    }
}

/// Parse `0x`-prefixed hex or decimal.
fn parse_address(text: &str) -> ProcmetaResult<Address>
{
    let trimmed = text.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => trimmed.replace('_', "").parse(),
    };
    parsed
        .map(Address::from)
        .map_err(|_| ProcmetaError::InvalidArgument(format!("not an address: {text}")))
}

fn inspect(path: &str, base: Address) -> ProcmetaResult<()>
{
    let data = fs::read(path)?;
    let layout = inspect_image(&data, base)?;

    println!("{path}");
    println!("  Entry: {}", layout.entry);
    println!("  Library: {}", layout.is_dll);
    println!("  Sections: {}", layout.sections.len());
    for section in &layout.sections {
        println!("    {:<10} {}  {:#x}", section.name, section.addr, section.size);
    }
    println!("  Exports: {}", layout.exports.len());
    for export in &layout.exports {
        println!("    {}  {}", export.address, export.name);
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn open_session(pid: i32, options: SessionOptions) -> ProcmetaResult<DebugSession>
{
    use std::sync::Arc;

    use procmeta_core::LinuxProcess;

    let process = LinuxProcess::open(pid)?;
    let images = process.maps()?.images();

    let session = DebugSession::new(options);
    session.attach(Arc::new(process));
    for image in images {
        if !session.on_module_load(image.base, image.size, &image.path) {
            procmeta_utils::debug!(path = %image.path, "module skipped");
        }
    }
    Ok(session)
}

#[cfg(not(target_os = "linux"))]
fn open_session(pid: i32, _options: SessionOptions) -> ProcmetaResult<DebugSession>
{
    Err(ProcmetaError::NotFound(format!(
        "process {pid}: live processes are only supported on Linux"
    )))
}

fn print_modules(session: &DebugSession)
{
    let modules = session.modules().list();
    println!("Modules: {}", modules.len());
    for module in modules {
        println!(
            "  {}  {:#10x}  {:08x}  {:<24} {}",
            module.base,
            module.size,
            module.hash,
            module.file_name(),
            module.path
        );
    }
}

fn print_memory_map(session: &DebugSession)
{
    let map = session.memory_map();
    println!("Committed regions: {}", map.count());
    for page in &map {
        let info = &page.info;
        println!(
            "  {}-{}  {}  {:?}  {}",
            info.base_address,
            info.end(),
            protection(info.protect),
            info.kind,
            page.module
        );
    }
}

#[cfg(target_os = "linux")]
fn protection(protect: u32) -> String
{
    use procmeta_core::platform::linux::{PROT_EXEC, PROT_READ, PROT_WRITE};

    [(PROT_READ, 'r'), (PROT_WRITE, 'w'), (PROT_EXEC, 'x')]
        .iter()
        .map(|(bit, flag)| if protect & bit != 0 { *flag } else { '-' })
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn protection(protect: u32) -> String
{
    format!("{protect:#x}")
}

fn print_address_info(session: &DebugSession, address: Address)
{
    let mut info = AddressInfo::request(InfoFlags::all());
    if !session.address_info_get(address, &mut info) {
        println!("{address}  <unknown>");
        return;
    }

    let mut line = format!("{address}  {}", info.module);
    if !info.label.is_empty() {
        line.push_str(&format!("!{}", info.label));
    }
    if !info.comment.is_empty() {
        line.push_str(&format!("  ; {}", info.comment));
    }
    println!("{line}");
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_address_forms()
    {
        assert_eq!(parse_address("0x401000").unwrap(), Address::from(0x40_1000));
        assert_eq!(parse_address("0X7fff_0000").unwrap(), Address::from(0x7fff_0000));
        assert_eq!(parse_address("4096").unwrap(), Address::from(4096));
        assert!(parse_address("main").is_err());
    }

    #[test]
    fn test_cli_parses_resolve()
    {
        let cli = Cli::try_parse_from(["procmeta", "--no-symbols", "resolve", "42", "0x1000", "0x2000"]).unwrap();
        assert!(cli.no_symbols);
        match cli.command {
            Commands::Resolve { pid, addresses } => {
                assert_eq!(pid, 42);
                assert_eq!(addresses, ["0x1000", "0x2000"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
