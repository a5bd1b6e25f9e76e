// unit tests

use super::*;

const BASE: usize = 0x1000;
const FLOAT_SIZE: usize = 4;

fn float_ranges(workers: usize, elements: usize) -> Vec<IndexRange> {
    partition_all(workers, elements, elements_per_unit::<f32>(CACHE_LINE_SIZE), false).unwrap()
}

#[test]
fn ten_elements_over_three_workers() {
    let ranges = partition_all(3, 10, 1, false).unwrap();
    assert_eq!(
        ranges,
        vec![
            IndexRange::new(0, 4),
            IndexRange::new(4, 7),
            IndexRange::new(7, 10)
        ]
    );
}

#[test]
fn fewer_elements_than_workers() {
    let ranges = partition_all(4, 2, 16, false).unwrap();
    let lengths: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
    assert_eq!(lengths, vec![1, 1, 0, 0]);
    assert_eq!(ranges[3], IndexRange::new(2, 2));
}

#[test]
fn zero_elements_gives_empty_ranges() {
    for range in partition_all(5, 0, 16, true).unwrap() {
        assert!(range.is_empty());
        assert_eq!(range.start, 0);
    }
}

#[test]
fn invalid_arguments_are_rejected() {
    assert_eq!(
        thread_block_partition(0, 10, 1, 0, false),
        Err(InvalidArgument::NoWorkers)
    );
    assert_eq!(
        thread_block_partition(3, 10, 1, 3, false),
        Err(InvalidArgument::WorkerOutOfRange {
            worker_id: 3,
            worker_count: 3
        })
    );
    assert_eq!(
        thread_block_partition(3, 10, 0, 1, true),
        Err(InvalidArgument::ZeroBlockSize)
    );
    assert_eq!(partition_all(0, 10, 1, false), Err(InvalidArgument::NoWorkers));
}

#[test]
fn request_matches_free_function() {
    let request = PartitionRequest {
        worker_count: 3,
        total_elements: 100,
        block_size: 16,
        worker_id: 1,
        handle_edge_low: true,
    };
    assert_eq!(
        request.range(),
        thread_block_partition(3, 100, 16, 1, true)
    );
}

#[test]
fn edge_low_puts_partial_block_on_first_worker() {
    // 6 whole blocks of 16 plus an edge of 4
    let ranges = partition_all(3, 100, 16, true).unwrap();
    assert_eq!(
        ranges,
        vec![
            IndexRange::new(0, 36),
            IndexRange::new(36, 68),
            IndexRange::new(68, 100)
        ]
    );

    // 4 whole blocks over 2 workers, edge of 6
    let ranges = partition_all(2, 70, 16, true).unwrap();
    assert_eq!(ranges, vec![IndexRange::new(0, 38), IndexRange::new(38, 70)]);
}

#[test]
fn edge_low_balances_blocks_not_elements() {
    let ranges = partition_all(2, 70, 16, true).unwrap();
    let lengths: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
    assert_eq!(lengths, vec![38, 32]);

    // without the edge of 6 both workers have 2 blocks
    assert_eq!((lengths[0] - 70 % 16) / 16, 2);
    assert_eq!(lengths[1] / 16, 2);
}

#[test]
fn edge_low_with_unit_blocks_is_even_split() {
    for workers in 1..6 {
        for elements in 0..40 {
            assert_eq!(
                partition_all(workers, elements, 1, true),
                partition_all(workers, elements, 1, false)
            );
        }
    }
}

#[test]
fn edge_low_smaller_than_one_block() {
    let ranges = partition_all(3, 5, 16, true).unwrap();
    assert_eq!(ranges[0], IndexRange::new(0, 5));
    assert!(ranges[1].is_empty());
    assert!(ranges[2].is_empty());
}

#[test]
fn aligned_partition_has_no_false_sharing() {
    let ranges = float_ranges(4, 256);
    let report = detect_false_sharing(&ranges, BASE, FLOAT_SIZE, CACHE_LINE_SIZE).unwrap();
    assert!(!report.has_false_sharing());
    assert!(report.conflicts().is_empty());
}

#[test]
fn misaligned_partition_reports_first_pair_only() {
    let ranges = float_ranges(4, 256);
    let report =
        detect_false_sharing(&ranges, BASE + FLOAT_SIZE, FLOAT_SIZE, CACHE_LINE_SIZE).unwrap();

    assert!(report.has_false_sharing());
    assert_eq!(report.conflicts().len(), 1);

    let conflict = report.first().unwrap();
    assert_eq!(conflict.first_worker, 0);
    assert_eq!(conflict.second_worker, 1);
    assert_eq!(conflict.first_units, UnitSpan { first: 64, last: 68 });
    assert_eq!(conflict.second_units, UnitSpan { first: 68, last: 72 });
}

#[test]
fn exhaustive_scan_lists_every_neighbour_pair() {
    let ranges = float_ranges(4, 256);
    let detector = OverlapDetector::new(BASE + FLOAT_SIZE, FLOAT_SIZE, CACHE_LINE_SIZE)
        .unwrap()
        .with_mode(ScanMode::AllConflicts);

    let pairs: Vec<(usize, usize)> = detector
        .detect(&ranges)
        .conflicts()
        .iter()
        .map(|c| (c.first_worker, c.second_worker))
        .collect();
    assert_eq!(pairs, vec![(0, 1), (1, 2), (2, 3)]);
}

#[test]
fn single_worker_never_shares() {
    // the range is not even inspected
    let ranges = [IndexRange::new(0, 1_000_000)];
    let report = detect_false_sharing(&ranges, BASE + 1, FLOAT_SIZE, CACHE_LINE_SIZE).unwrap();
    assert!(!report.has_false_sharing());
}

#[test]
fn empty_ranges_touch_no_cache_lines() {
    let ranges = [
        IndexRange::new(0, 1),
        IndexRange::new(1, 1),
        IndexRange::new(1, 1),
    ];
    let report = detect_false_sharing(&ranges, BASE, FLOAT_SIZE, CACHE_LINE_SIZE).unwrap();
    assert!(!report.has_false_sharing());

    let detector = OverlapDetector::new(BASE, FLOAT_SIZE, CACHE_LINE_SIZE).unwrap();
    assert_eq!(detector.addressed(IndexRange::new(3, 3)), None);
}

#[test]
fn overlapping_doubles_share_a_line() {
    // thread 0 on doubles 0-7, thread 1 on doubles 7-15
    let ranges = [IndexRange::new(0, 8), IndexRange::new(7, 16)];
    let report = detect_false_sharing(&ranges, 0, 8, CACHE_LINE_SIZE).unwrap();
    let conflict = report.first().unwrap();
    assert_eq!(conflict.first_units, UnitSpan { first: 0, last: 0 });
    assert_eq!(conflict.second_units, UnitSpan { first: 0, last: 1 });
}

#[test]
fn addressed_range_bytes() {
    let detector = OverlapDetector::new(BASE, FLOAT_SIZE, CACHE_LINE_SIZE).unwrap();
    let addressed = detector.addressed(IndexRange::new(16, 32)).unwrap();
    assert_eq!(addressed.first_byte, BASE + 64);
    assert_eq!(addressed.last_byte, BASE + 124);
    assert_eq!(
        detector.units(IndexRange::new(16, 32)),
        Some(UnitSpan { first: 65, last: 65 })
    );
}

#[test]
fn addresses_past_the_end_are_not_mapped() {
    let detector = OverlapDetector::new(usize::MAX - 8, FLOAT_SIZE, CACHE_LINE_SIZE).unwrap();
    assert!(detector.addressed(IndexRange::new(0, 2)).is_some());
    assert_eq!(detector.addressed(IndexRange::new(0, 4)), None);
    assert_eq!(detector.units(IndexRange::new(usize::MAX - 1, usize::MAX)), None);

    let ranges = [IndexRange::new(0, 1), IndexRange::new(1, 8)];
    assert!(!detector.detect(&ranges).has_false_sharing());
}

#[test]
fn zero_sizes_are_rejected() {
    assert_eq!(
        OverlapDetector::new(BASE, 0, CACHE_LINE_SIZE),
        Err(InvalidArgument::ZeroElementSize)
    );
    assert_eq!(
        OverlapDetector::new(BASE, FLOAT_SIZE, 0),
        Err(InvalidArgument::ZeroUnitSize)
    );
}

#[test]
fn report_text_names_workers_and_lines() {
    let ranges = float_ranges(4, 256);
    let report =
        detect_false_sharing(&ranges, BASE + FLOAT_SIZE, FLOAT_SIZE, CACHE_LINE_SIZE).unwrap();
    let text = report.to_string();
    assert!(text.contains("threads 0 and 1"));
    assert!(text.contains("cache lines 64-68"));
    assert!(text.contains("cache lines 68-72"));

    let clean = OverlapReport::default().to_string();
    assert!(clean.starts_with("No false sharing"));
}

#[test]
fn slice_detector_uses_real_address() {
    let data = vec![0f64; 32];
    let detector = OverlapDetector::for_slice(&data, CACHE_LINE_SIZE).unwrap();
    assert_eq!(detector.base_address(), data.as_ptr() as usize);
    assert_eq!(detector.element_size(), 8);
}

#[test]
fn unit_helpers() {
    assert_eq!(elements_per_unit::<f32>(64), 16);
    assert_eq!(elements_per_unit::<f64>(64), 8);
    assert_eq!(elements_per_unit::<[u8; 128]>(64), 1);
    assert!(is_aligned(0x1000, 64));
    assert!(!is_aligned(0x1004, 64));
    assert!(!is_aligned(0x1000, 0));
}
