use crate::{
    Classification, ConfidenceBand, DeviceConfig, Direction, LatencyClassifier, LatencyDevice,
    ManualClock, TransferRequest, VbdError,
};
use proptest::prelude::*;
use proptest::test_runner::TestCaseResult;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Op {
    Write { sector: u64, sectors: u64, fill: u8 },
    Read { sector: u64, sectors: u64 },
}

const MAX_SECTORS: u64 = 64;
const MAX_OPS: usize = 48;

fn block_size_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![Just(1u32), Just(512u32), Just(1024u32), Just(4096u32)]
}

fn op_strategy(total_sectors: u64) -> BoxedStrategy<Op> {
    // Allow ranges that run past the end so rejections are exercised too.
    let range = (0..=total_sectors + 2, 0..=4u64);
    prop_oneof![
        (range.clone(), any::<u8>())
            .prop_map(|((sector, sectors), fill)| Op::Write { sector, sectors, fill }),
        range.prop_map(|(sector, sectors)| Op::Read { sector, sectors }),
    ]
    .boxed()
}

fn scenario_strategy() -> BoxedStrategy<(u32, u64, Vec<Op>)> {
    (block_size_strategy(), 1..=MAX_SECTORS)
        .prop_flat_map(|(block_size, total_sectors)| {
            (
                Just(block_size),
                Just(total_sectors),
                prop::collection::vec(op_strategy(total_sectors), 1..=MAX_OPS),
            )
        })
        .boxed()
}

fn run_against_model(block_size: u32, total_sectors: u64, ops: &[Op]) -> TestCaseResult {
    let config = DeviceConfig {
        block_size_bytes: block_size,
        total_sectors,
        target_read_latency_us: 50,
        target_write_latency_us: 80,
        tolerance_percent: 10,
    };
    let clock = ManualClock::new();
    clock.set_auto_advance(Duration::from_micros(3));
    let dev = LatencyDevice::with_clock(config, clock).unwrap();

    let bs = block_size as usize;
    let mut model = vec![0u8; bs * total_sectors as usize];

    for op in ops {
        let before = dev.stats();
        let (sector, sectors) = match op {
            Op::Write { sector, sectors, .. } | Op::Read { sector, sectors } => (*sector, *sectors),
        };
        let fits = sector + sectors <= total_sectors;
        let start = sector as usize * bs;
        let len = sectors as usize * bs;

        let result = match op {
            Op::Write { fill, .. } => {
                let data = vec![*fill; len];
                let result = dev.transfer(TransferRequest::write(sector, sectors, &data));
                if fits {
                    model[start..start + len].copy_from_slice(&data);
                }
                result
            }
            Op::Read { .. } => {
                let mut buf = vec![0xA5u8; len];
                let result = dev.transfer(TransferRequest::read(sector, sectors, &mut buf));
                if fits {
                    prop_assert_eq!(&buf[..], &model[start..start + len]);
                } else {
                    prop_assert!(buf.iter().all(|b| *b == 0xA5));
                }
                result
            }
        };

        let after = dev.stats();
        if fits {
            prop_assert!(result.is_ok());
            prop_assert_eq!(after.total(), before.total() + 1);
        } else {
            let rejected = matches!(result, Err(VbdError::BeyondCapacity { .. }));
            prop_assert!(rejected, "expected BeyondCapacity, got {:?}", result);
            prop_assert_eq!(after, before);
        }
    }

    // Whole-device readback matches the model.
    let mut all = vec![0u8; model.len()];
    dev.transfer(TransferRequest::read(0, total_sectors, &mut all))
        .unwrap();
    prop_assert_eq!(all, model);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn device_matches_reference_model((block_size, total_sectors, ops) in scenario_strategy()) {
        run_against_model(block_size, total_sectors, &ops)?;
    }

    #[test]
    fn classification_is_open_interval(
        target in 0u64..1_000_000,
        tolerance in 0u32..=200,
        observed in 0u64..2_000_000,
    ) {
        let band = ConfidenceBand::new(target, tolerance);
        let classifier = LatencyClassifier::new(target, target, tolerance);
        let expected = if band.lower_us < observed && observed < band.upper_us {
            Classification::Confirmed
        } else {
            Classification::Error
        };
        prop_assert_eq!(classifier.classify(Direction::Read, observed), expected);
        prop_assert_eq!(classifier.classify(Direction::Write, observed), expected);
        prop_assert_eq!(classifier.classify(Direction::Read, band.lower_us), Classification::Error);
        prop_assert_eq!(classifier.classify(Direction::Read, band.upper_us), Classification::Error);
    }

    #[test]
    fn waited_transfers_never_finish_early(
        target in 0u64..5_000,
        copy_cost in 0u64..6_000,
        step in 1u64..200,
    ) {
        let config = DeviceConfig {
            block_size_bytes: 512,
            total_sectors: 4,
            target_read_latency_us: target,
            target_write_latency_us: target,
            tolerance_percent: 10,
        };
        let clock = ManualClock::new();
        clock.set_auto_advance(Duration::from_micros(copy_cost));
        clock.set_pause_step(Duration::from_micros(step));
        let dev = LatencyDevice::with_clock(config, clock).unwrap();

        let mut buf = vec![0u8; 512];
        let outcome = dev.transfer(TransferRequest::read(1, 1, &mut buf)).unwrap();
        prop_assert_eq!(outcome.copy_latency_us, copy_cost);
        if copy_cost > target {
            prop_assert!(outcome.overdue);
            prop_assert_eq!(outcome.total_latency_us, copy_cost);
            prop_assert_eq!(outcome.classification, Classification::Error);
        } else {
            prop_assert!(!outcome.overdue);
            prop_assert!(outcome.total_latency_us >= target);
        }
    }
}
