//! End-to-end snapshot ingestion coverage: header variants, chunk
//! demultiplexing, resumability, progress accounting, and fatal streams.

#![allow(clippy::pedantic, clippy::nursery, clippy::cast_possible_truncation)]

use loader_core::{
    HazardWindow, InterruptMode, Loader, LoaderError, Platform, SwitchPort, Trampoline,
    LOADER_PAGE_OUT, MEMCFG_48K, PAGE_SIZE,
};
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

/// In-memory stand-in for the target machine: a flat 64 KiB address space
/// plus eight switchable RAM banks behind the top window.
#[derive(Clone)]
struct Harness {
    memory: Vec<u8>,
    banks: Vec<Vec<u8>>,
    selected: Option<u8>,
    bank_selections: Vec<u8>,
    stash: Option<(HazardWindow, Vec<u8>)>,
    progress: Vec<(u16, u16)>,
    paging: Vec<u8>,
    border: Option<u8>,
    transfer: Option<Trampoline>,
}

impl Harness {
    fn new() -> Self {
        Self {
            memory: vec![0; 0x10000],
            banks: vec![vec![0; usize::from(PAGE_SIZE)]; 8],
            selected: None,
            bank_selections: Vec::new(),
            stash: None,
            progress: Vec::new(),
            paging: Vec::new(),
            border: None,
            transfer: None,
        }
    }
}

impl Platform for Harness {
    fn write_byte(&mut self, address: u16, value: u8) {
        if let Some(bank) = self.selected {
            if address >= 0xC000 {
                self.banks[usize::from(bank)][usize::from(address - 0xC000)] = value;
                return;
            }
        }
        self.memory[usize::from(address)] = value;
    }

    fn select_bank(&mut self, bank: u8) {
        self.selected = Some(bank);
        self.bank_selections.push(bank);
    }

    fn stash_evacuated(&mut self, window: HazardWindow, data: &[u8]) {
        self.stash = Some((window, data.to_vec()));
    }

    fn report_progress(&mut self, kilobytes_loaded: u16, kilobytes_expected: u16) {
        self.progress.push((kilobytes_loaded, kilobytes_expected));
    }
}

impl SwitchPort for Harness {
    fn disable_interrupts(&mut self) {}

    fn configure_paging(&mut self, config: u8) {
        self.paging.push(config);
    }

    fn configure_sound(&mut self, _registers: &[u8; 16], _selected: u8) {}

    fn set_border(&mut self, colour: u8) {
        self.border = Some(colour);
    }

    fn set_interrupt_mode(&mut self, _mode: InterruptMode) {}

    fn restore_evacuated(&mut self, window: HazardWindow) {
        let (stashed, data) = self.stash.clone().expect("restore without a stash");
        assert_eq!(stashed, window);
        let start = usize::from(window.start);
        self.memory[start..start + data.len()].copy_from_slice(&data);
    }

    fn load_alternate_registers(&mut self, _af: u16, _bc: u16, _de: u16, _hl: u16) {}
    fn load_index_registers(&mut self, _ix: u16, _iy: u16) {}
    fn load_interrupt_vector(&mut self, _i: u8) {}
    fn load_primary_registers(&mut self, _af: u16, _bc: u16, _de: u16, _hl: u16) {}
    fn load_stack_pointer(&mut self, _sp: u16) {}
    fn load_refresh_register(&mut self, _r: u8) {}

    fn transfer(&mut self, trampoline: Trampoline) {
        self.transfer = Some(trampoline);
    }
}

fn base_header(pc: u16, flags: u8) -> Vec<u8> {
    let mut h = vec![0u8; 30];
    h[6] = (pc & 0xFF) as u8;
    h[7] = (pc >> 8) as u8;
    h[12] = flags;
    h[27] = 0x01; // IFF1 set
    h[29] = 0x01; // IM 1
    h
}

fn v2_header_48k(pc: u16) -> Vec<u8> {
    let mut h = base_header(0, 0x02); // border 1
    h.extend_from_slice(&[23, 0]);
    let mut ext = vec![0u8; 23];
    ext[0] = (pc & 0xFF) as u8;
    ext[1] = (pc >> 8) as u8;
    h.extend_from_slice(&ext);
    h
}

fn v2_header_16k(pc: u16) -> Vec<u8> {
    let mut h = v2_header_48k(pc);
    h[37] = 0x80; // modification flag: 16K machine
    h
}

fn v3_header_128k(pc: u16, port_7ffd: u8) -> Vec<u8> {
    let mut h = base_header(0, 0x02);
    h.extend_from_slice(&[54, 0]);
    let mut ext = vec![0u8; 54];
    ext[0] = (pc & 0xFF) as u8;
    ext[1] = (pc >> 8) as u8;
    ext[2] = 0x04; // 128K under the version-3 layout
    ext[3] = port_7ffd;
    h.extend_from_slice(&ext);
    h
}

/// One full uncompressed page using the 0xFFFF length sentinel.
fn sentinel_page(bank_id: u8, fill: u8) -> Vec<u8> {
    let mut chunk = vec![0xFF, 0xFF, bank_id];
    chunk.extend(std::iter::repeat(fill).take(usize::from(PAGE_SIZE)));
    chunk
}

fn stream_48k(pc: u16) -> Vec<u8> {
    let mut stream = v2_header_48k(pc);
    stream.extend(sentinel_page(8, 0xA8)); // 0x4000..0x8000
    stream.extend(sentinel_page(4, 0xA4)); // 0x8000..0xC000
    stream.extend(sentinel_page(5, 0xA5)); // 0xC000..0x10000
    stream
}

fn feed_in_slices(
    loader: &mut Loader,
    harness: &mut Harness,
    stream: &[u8],
    slice: usize,
) -> Result<(), LoaderError> {
    for chunk in stream.chunks(slice) {
        loader.feed(chunk, harness)?;
    }
    Ok(())
}

#[test]
fn complete_48k_load_reaches_context_switch() {
    let stream = stream_48k(0x8123);
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();

    assert!(loader.is_complete());
    assert!(loader.end_of_stream().is_ok());
    assert_eq!(loader.kilobytes_loaded(), 48);
    assert_eq!(
        harness.transfer,
        Some(Trampoline {
            pc: 0x8123,
            memory_config: LOADER_PAGE_OUT,
            enable_interrupts: true,
        })
    );
    assert_eq!(harness.paging, vec![MEMCFG_48K]);
    assert_eq!(harness.border, Some(1));

    // Every written address holds its page's fill value, including the
    // evacuated range restored during the switch.
    assert!(harness.memory[0x4000..0x8000].iter().all(|&b| b == 0xA8));
    assert!(harness.memory[0x8000..0xC000].iter().all(|&b| b == 0xA4));
    assert!(harness.memory[0xC000..0x10000].iter().all(|&b| b == 0xA5));
}

#[test]
fn progress_runs_from_zero_to_expected_per_kilobyte() {
    let stream = stream_48k(0x8000);
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();

    assert_eq!(harness.progress.first(), Some(&(0, 48)));
    assert_eq!(harness.progress.last(), Some(&(48, 48)));
    assert_eq!(harness.progress.len(), 49);
    assert!(harness.progress.windows(2).all(|w| w[1].0 == w[0].0 + 1));
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(512)]
fn load_resumes_across_arbitrary_slice_sizes(#[case] slice: usize) {
    let stream = stream_48k(0x9000);
    let mut reference = Harness::new();
    Loader::new().feed(&stream, &mut reference).unwrap();

    let mut loader = Loader::new();
    let mut harness = Harness::new();
    feed_in_slices(&mut loader, &mut harness, &stream, slice).unwrap();

    assert!(loader.is_complete());
    assert_eq!(harness.memory, reference.memory);
    assert_eq!(harness.progress, reference.progress);
    assert_eq!(harness.transfer, reference.transfer);
}

#[test]
fn sixteen_k_snapshot_completes_after_one_page() {
    let mut stream = v2_header_16k(0x5B00);
    stream.extend(sentinel_page(8, 0x16));
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();

    assert!(loader.is_complete());
    assert_eq!(loader.kilobytes_loaded(), 16);
    assert_eq!(harness.progress.first(), Some(&(0, 16)));
    assert!(harness.memory[0x4000..0x8000].iter().all(|&b| b == 0x16));
}

#[test]
fn version_1_linear_image_loads_from_ram_base() {
    let mut stream = base_header(0x7000, 0x00); // uncompressed
    stream.extend((0..0xC000u32).map(|i| (i % 251) as u8));
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();

    assert!(loader.is_complete());
    assert_eq!(loader.kilobytes_loaded(), 48);
    for i in 0..0xC000u32 {
        assert_eq!(harness.memory[0x4000 + i as usize], (i % 251) as u8);
    }
    assert_eq!(harness.transfer.unwrap().pc, 0x7000);
}

#[test]
fn legacy_compressed_body_decodes_at_ram_base() {
    // Version-1 header (non-zero PC) with a compressed body: two literals
    // then a five-byte run, landing at the bottom of RAM.
    let mut stream = base_header(0x7000, 0x20);
    stream.extend_from_slice(&[0x41, 0x42, 0xED, 0xED, 0x05, 0x58]);
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();

    assert!(!loader.is_complete());
    assert_eq!(
        &harness.memory[0x4000..0x4007],
        &[0x41, 0x42, 0x58, 0x58, 0x58, 0x58, 0x58]
    );

    // The linear image budget is nowhere near spent; further bytes keep
    // decoding where the run left off.
    loader.feed(&[0x99, 0x9A], &mut harness).unwrap();
    assert_eq!(&harness.memory[0x4007..0x4009], &[0x99, 0x9A]);
}

#[test]
fn reused_loader_matches_a_fresh_one() {
    let first = stream_48k(0x8000);
    let mut second = v2_header_16k(0x5B00);
    second.extend(sentinel_page(8, 0x33));

    let mut reference = Harness::new();
    Loader::new().feed(&second, &mut reference).unwrap();

    let mut loader = Loader::new();
    let mut scratch = Harness::new();
    loader.feed(&first, &mut scratch).unwrap();
    assert!(loader.is_complete());

    loader.expect_snapshot();
    assert!(!loader.is_complete());
    assert!(loader.snapshot().is_none());
    assert_eq!(loader.kilobytes_loaded(), 0);

    let mut harness = Harness::new();
    loader.feed(&second, &mut harness).unwrap();

    assert!(loader.is_complete());
    assert_eq!(harness.memory, reference.memory);
    assert_eq!(harness.progress, reference.progress);
    assert_eq!(harness.transfer, reference.transfer);
}

#[test]
fn compressed_run_expands_to_destination() {
    // Two literals then a five-byte run, landing at the bank-4 address.
    let mut stream = v2_header_48k(0x8000);
    stream.extend_from_slice(&[0x06, 0x00, 4]);
    stream.extend_from_slice(&[0x41, 0x42, 0xED, 0xED, 0x05, 0x58]);
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();

    assert!(!loader.is_complete());
    assert_eq!(&harness.memory[0x8000..0x8007], &[0x41, 0x42, 0x58, 0x58, 0x58, 0x58, 0x58]);
}

#[test]
fn lone_escape_byte_is_literal_data() {
    let mut stream = v2_header_48k(0x8000);
    stream.extend_from_slice(&[0x04, 0x00, 4]);
    stream.extend_from_slice(&[0xED, 0x41, 0x42, 0x43]);
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();

    assert_eq!(&harness.memory[0x8000..0x8004], &[0xED, 0x41, 0x42, 0x43]);
}

#[test]
fn zero_count_run_writes_nothing() {
    let mut stream = v2_header_48k(0x8000);
    stream.extend_from_slice(&[0x05, 0x00, 4]);
    stream.extend_from_slice(&[0xED, 0xED, 0x00, 0x99, 0x77]);
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();

    // The run contributes nothing; the trailing literal is the only write.
    assert_eq!(&harness.memory[0x8000..0x8002], &[0x77, 0x00]);
}

#[test]
fn escape_sequence_survives_a_slice_boundary() {
    let mut head = v2_header_48k(0x8000);
    head.extend_from_slice(&[0x05, 0x00, 4, 0xED]);
    let tail = [0xED, 0x03, 0x55];
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&head, &mut harness).unwrap();
    loader.feed(&tail, &mut harness).unwrap();

    assert_eq!(&harness.memory[0x8000..0x8004], &[0x55, 0x55, 0x55, 0x00]);
}

#[test]
fn chunk_budget_counts_encoded_bytes() {
    // A 4-byte compressed chunk expanding to 6 bytes, then a second chunk.
    let mut stream = v2_header_48k(0x8000);
    stream.extend_from_slice(&[0x04, 0x00, 4]);
    stream.extend_from_slice(&[0xED, 0xED, 0x05, 0x31]);
    stream.extend_from_slice(&[0x02, 0x00, 5]);
    stream.extend_from_slice(&[0x62, 0x63]);
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();

    assert_eq!(&harness.memory[0x8000..0x8005], &[0x31; 5]);
    assert_eq!(&harness.memory[0xC000..0xC002], &[0x62, 0x63]);
}

#[test]
fn banked_snapshot_demultiplexes_all_eight_banks() {
    let mut stream = v3_header_128k(0xC000, 0x11);
    for id in 3..=10u8 {
        stream.extend(sentinel_page(id, 0xB0 + id));
    }
    let mut loader = Loader::with_hazard_window(HazardWindow::disabled());
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();

    assert!(loader.is_complete());
    assert_eq!(loader.kilobytes_loaded(), 128);
    assert_eq!(harness.bank_selections, (0..8).collect::<Vec<u8>>());
    for bank in 0..8u8 {
        assert!(harness.banks[usize::from(bank)]
            .iter()
            .all(|&b| b == 0xB0 + bank + 3));
    }
    // The captured paging-port value wins over the 48K default.
    assert_eq!(harness.paging, vec![0x11]);
}

#[test]
fn bank_id_outside_valid_range_is_fatal() {
    let mut stream = v2_header_48k(0x8000);
    stream.extend_from_slice(&[0x10, 0x00, 11]);
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    assert_eq!(
        loader.feed(&stream, &mut harness),
        Err(LoaderError::IncompatibleSnapshot)
    );
    assert!(harness.memory.iter().all(|&b| b == 0));
}

#[test]
fn bank_id_without_a_48k_mapping_is_fatal() {
    let mut stream = v2_header_48k(0x8000);
    stream.extend_from_slice(&[0x10, 0x00, 6]);
    let mut loader = Loader::new();

    assert_eq!(
        loader.feed(&stream, &mut Harness::new()),
        Err(LoaderError::IncompatibleSnapshot)
    );
}

#[test]
fn trailing_bytes_in_the_completing_slice_are_ignored() {
    let mut stream = stream_48k(0x8000);
    stream.extend_from_slice(&[0xDE, 0xAD]);
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();
    assert!(loader.is_complete());
}

#[test]
fn feeding_after_completion_is_fatal() {
    let stream = stream_48k(0x8000);
    let mut loader = Loader::new();
    let mut harness = Harness::new();
    loader.feed(&stream, &mut harness).unwrap();

    assert_eq!(
        loader.feed(&[0x00], &mut harness),
        Err(LoaderError::MalformedStream)
    );
}

#[test]
fn early_end_of_stream_is_fatal() {
    let mut stream = v2_header_48k(0x8000);
    stream.extend(sentinel_page(8, 0x01));
    let mut loader = Loader::new();
    let mut harness = Harness::new();

    loader.feed(&stream, &mut harness).unwrap();

    assert!(!loader.is_complete());
    assert_eq!(loader.end_of_stream(), Err(LoaderError::MalformedStream));
}

#[test]
fn evacuated_range_matches_a_reference_run() {
    let stream = stream_48k(0x8000);

    let mut evacuating = Harness::new();
    Loader::new().feed(&stream, &mut evacuating).unwrap();

    let mut reference = Harness::new();
    Loader::with_hazard_window(HazardWindow::disabled())
        .feed(&stream, &mut reference)
        .unwrap();

    assert_eq!(evacuating.memory, reference.memory);
    assert!(evacuating.stash.is_some());
    assert!(reference.stash.is_none());
}
