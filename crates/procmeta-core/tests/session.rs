//! Tests for the debug session boundary

mod common;

use std::sync::Arc;

use common::{region, FakeMemory, FakeProcess, FakeRegions, FakeSymbols, PeImage, IMAGE_SIZE};
use procmeta_core::addrinfo::{AddressInfo, InfoFlags};
use procmeta_core::annotations::{AnnotationKind, AnnotationStore, Origin};
use procmeta_core::error::ProcmetaError;
use procmeta_core::events::ModuleEvent;
use procmeta_core::registers::ContextRegister;
use procmeta_core::session::{DebugSession, SessionOptions, ENTRY_POINT_LABEL};
use procmeta_core::symbols::SymbolProvider;
use procmeta_core::types::{Address, MemoryState};
use procmeta_core::Debuggee;

const BASE: u64 = 0x1_0000_0000;

fn options() -> SessionOptions
{
    SessionOptions {
        load_debug_symbols: false,
        ..SessionOptions::default()
    }
}

fn label_at(session: &DebugSession, address: u64) -> Option<String>
{
    let mut info = AddressInfo::request(InfoFlags::LABEL);
    session
        .address_info_get(Address::from(address), &mut info)
        .then(|| info.label.as_str().to_owned())
}

fn injected_process() -> FakeProcess
{
    let image = PeImage::dll(0x1010, &[("Alpha", 0x1020), ("Beta", 0x1040)]).build();
    FakeProcess {
        memory: FakeMemory::default().with_block(BASE, image),
        ..FakeProcess::default()
    }
}

#[test]
fn test_virtual_module_gets_entry_and_export_labels()
{
    let session = DebugSession::new(options());
    session.attach(Arc::new(injected_process()));

    assert!(session.on_module_load(Address::from(BASE), IMAGE_SIZE, "virtual:\\Injected.dll"));

    assert_eq!(label_at(&session, BASE + 0x1010).as_deref(), Some(ENTRY_POINT_LABEL));
    assert_eq!(label_at(&session, BASE + 0x1020).as_deref(), Some("Alpha"));
    assert_eq!(label_at(&session, BASE + 0x1040).as_deref(), Some("Beta"));

    let label = session
        .annotations()
        .get(AnnotationKind::Label, Address::from(BASE + 0x1020))
        .unwrap();
    assert_eq!(label.origin, Origin::Auto);
}

#[test]
fn test_virtual_module_labels_can_be_disabled()
{
    let session = DebugSession::new(SessionOptions {
        label_virtual_modules: false,
        load_debug_symbols: false,
    });
    session.attach(Arc::new(injected_process()));

    assert!(session.on_module_load(Address::from(BASE), IMAGE_SIZE, "virtual:\\Injected.dll"));
    assert!(session.annotations().is_empty());
}

#[test]
fn test_module_reads_lift_breakpoint_traps()
{
    let session = DebugSession::new(options());
    let process = Arc::new(injected_process());
    session.attach(Arc::clone(&process) as Arc<dyn Debuggee>);

    assert!(session.on_module_load(Address::from(BASE), IMAGE_SIZE, "virtual:\\Injected.dll"));
    let (lifted, restored) = process.traps.counts();
    assert!(lifted >= 1);
    assert_eq!(lifted, restored);
}

#[test]
fn test_subscribers_receive_module_lists()
{
    let session = DebugSession::new(options());
    let events = session.subscribe();

    assert!(session.on_module_load(Address::from(0x40_0000), 0x1000, "C:\\app\\game.exe"));
    assert!(session.on_module_load(Address::from(0x50_0000), 0x1000, "C:\\app\\engine.dll"));
    assert!(session.on_module_unload(Address::from(0x40_0000)));

    let sizes: Vec<usize> = events
        .try_iter()
        .map(|ModuleEvent::ModuleListUpdated(modules)| modules.len())
        .collect();
    assert_eq!(sizes, [1, 2, 1]);
}

#[test]
fn test_rejected_load_publishes_nothing()
{
    let session = DebugSession::new(options());
    let events = session.subscribe();

    assert!(session.on_module_load(Address::from(0x40_0000), 0x2000, "/a.so"));
    assert!(!session.on_module_load(Address::from(0x40_1000), 0x2000, "/b.so"));
    assert!(!session.on_module_load(Address::ZERO, 0x1000, "/c.so"));
    assert!(!session.on_module_unload(Address::from(0x90_0000)));

    assert_eq!(events.try_iter().count(), 1);
}

#[test]
fn test_symbol_provider_sees_every_module_list()
{
    let symbols = Arc::new(FakeSymbols::default());
    let session = DebugSession::with_symbols(options(), Arc::clone(&symbols) as Arc<dyn SymbolProvider>);

    assert!(session.on_module_load(Address::from(0x40_0000), 0x1000, "/a.so"));
    assert!(session.on_module_load(Address::from(0x50_0000), 0x1000, "/b.so"));
    session.on_process_exit();

    assert_eq!(*symbols.module_lists.lock().unwrap(), [1, 2, 0]);
}

#[test]
fn test_process_exit_keeps_only_user_annotations()
{
    let session = DebugSession::new(options());
    session.attach(Arc::new(injected_process()));
    let events = session.subscribe();
    assert!(session.on_module_load(Address::from(BASE), IMAGE_SIZE, "virtual:\\Injected.dll"));

    let mut comment = AddressInfo::request(InfoFlags::COMMENT);
    comment.comment.set_truncated("checked");
    assert!(session.address_info_set(Address::from(BASE + 0x1020), &comment));

    session.on_process_exit();

    assert!(session.modules().is_empty());
    assert_eq!(session.annotations().len(), 1);
    let last = events.try_iter().last().unwrap();
    assert_eq!(last, ModuleEvent::ModuleListUpdated(Vec::new()));
    assert_eq!(last.describe(), "Module list cleared");
}

#[test]
fn test_user_label_survives_rebase()
{
    let session = DebugSession::new(options());
    assert!(session.on_module_load(Address::from(0x40_0000), 0x1000, "C:\\app\\game.exe"));

    let mut info = AddressInfo::request(InfoFlags::LABEL);
    info.label.set_truncated("update_player");
    assert!(session.address_info_set(Address::from(0x40_0480), &info));

    session.on_process_exit();
    assert!(session.on_module_load(Address::from(0x7f_0000), 0x1000, "C:\\app\\game.exe"));

    assert_eq!(label_at(&session, 0x7f_0480).as_deref(), Some("update_player"));
    assert_eq!(label_at(&session, 0x40_0480), None);
}

#[test]
fn test_address_info_set_outcomes()
{
    let session = DebugSession::new(options());
    let mut info = AddressInfo::request(InfoFlags::COMMENT);
    info.comment.set_truncated(&"c".repeat(400));
    assert!(session.address_info_set(Address::from(0x1000), &info));

    assert!(!session.address_info_set(Address::from(0x1000), &AddressInfo::request(InfoFlags::MODULE)));
}

#[test]
fn test_detached_session_reports_defaults()
{
    let session = DebugSession::new(options());
    assert!(!session.is_debugging());

    let mut buffer = [0u8; 4];
    assert!(!session.mem_read(Address::from(0x1000), &mut buffer));
    assert!(matches!(
        session.read_memory(Address::from(0x1000), 4),
        Err(ProcmetaError::NotAttached)
    ));
    assert_eq!(session.mem_find_base(Address::from(0x1000)), (Address::ZERO, 0));
    assert!(!session.mem_is_valid_read_ptr(Address::from(0x1000)));
    assert!(session.memory_map().is_empty());
    assert!(session.register_dump().is_zero());
}

#[test]
fn test_memory_operations_through_debuggee()
{
    let session = DebugSession::new(options());
    let process = FakeProcess {
        memory: FakeMemory::default().with_block(0x2000, vec![0xde, 0xad, 0xbe, 0xef]),
        regions: FakeRegions(vec![
            region(0x2000, 0x1000, 0x2000, MemoryState::Commit),
            region(0x3000, 0x2000, 0x2000, MemoryState::Commit),
        ]),
        ..FakeProcess::default()
    };
    session.attach(Arc::new(process));

    let mut buffer = [0u8; 4];
    assert!(session.mem_read(Address::from(0x2000), &mut buffer));
    assert_eq!(buffer, [0xde, 0xad, 0xbe, 0xef]);

    assert!(!session.mem_read(Address::from(0x2002), &mut buffer));
    assert!(!session.mem_read(Address::from(0x2000), &mut [0u8; 0]));

    assert!(session.mem_is_valid_read_ptr(Address::from(0x2003)));
    assert!(!session.mem_is_valid_read_ptr(Address::from(0x2004)));

    assert_eq!(session.mem_find_base(Address::from(0x3800)), (Address::from(0x2000), 0x3000));

    assert_eq!(session.read_memory(Address::from(0x2001), 2).unwrap(), [0xad, 0xbe]);

    session.detach();
    assert!(!session.mem_read(Address::from(0x2000), &mut buffer));
    assert!(matches!(
        session.read_memory(Address::from(0x2000), 4),
        Err(ProcmetaError::NotAttached)
    ));
}

#[test]
fn test_register_dump_from_attached_context()
{
    let session = DebugSession::new(options());
    let mut process = FakeProcess::default();
    process.context.attached = true;
    process.context.values.extend([
        (ContextRegister::Cax, 0x1234),
        (ContextRegister::Cip, 0x40_1000),
        (ContextRegister::Eflags, 0x246),
        (ContextRegister::Cs, 0x1_0033),
        (ContextRegister::Dr7, 0x401),
    ]);
    session.attach(Arc::new(process));

    let regs = session.register_dump();
    assert_eq!(regs.cax, 0x1234);
    assert_eq!(regs.cip, 0x40_1000);
    assert_eq!(regs.eflags, 0x246);
    assert!(regs.flags.z && regs.flags.i && !regs.flags.c);
    assert_eq!(regs.cs, 0x33);
    assert_eq!(regs.dr7, 0x401);
}

#[test]
fn test_register_dump_without_thread_context_is_zero()
{
    let session = DebugSession::new(options());
    let mut process = FakeProcess::default();
    process.context.values.insert(ContextRegister::Cax, 7);
    session.attach(Arc::new(process));

    assert!(session.register_dump().is_zero());
}
