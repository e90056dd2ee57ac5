use bitstream::{BitReader, BitWriter};
use proptest::prelude::*;
use wire::{
    decode_high_res, decode_low_res, encode_high_res, encode_low_res, read_skip_run,
    write_skip_run, CoordGrid,
};

fn coord_strategy() -> impl Strategy<Value = CoordGrid> {
    (0i32..4, 0i32..16_384, 0i32..16_384)
        .prop_map(|(level, x, z)| CoordGrid::new(level, x, z).unwrap())
}

fn nearby_strategy() -> impl Strategy<Value = (CoordGrid, CoordGrid)> {
    (coord_strategy(), -20i32..=20, -20i32..=20, -1i32..=1).prop_map(|(from, dx, dz, dl)| {
        let level = (i32::from(from.level()) + dl).clamp(0, 3);
        let x = (i32::from(from.x()) + dx).clamp(0, 16_383);
        let z = (i32::from(from.z()) + dz).clamp(0, 16_383);
        (from, CoordGrid::new(level, x, z).unwrap())
    })
}

proptest! {
    #[test]
    fn prop_high_res_roundtrip(from in coord_strategy(), to in coord_strategy()) {
        let packed = encode_high_res(from, to).unwrap();
        if from == to {
            prop_assert!(packed.is_none());
        } else {
            let mut writer = BitWriter::new();
            writer.write_packed(packed.unwrap());
            let bytes = writer.finish();
            let delta = decode_high_res(&mut BitReader::new(&bytes)).unwrap().unwrap();
            prop_assert_eq!(delta.apply(from), to);
        }
    }

    #[test]
    fn prop_high_res_nearby_roundtrip((from, to) in nearby_strategy()) {
        if let Some(packed) = encode_high_res(from, to).unwrap() {
            let mut writer = BitWriter::new();
            writer.write_packed(packed);
            let bytes = writer.finish();
            let delta = decode_high_res(&mut BitReader::new(&bytes)).unwrap().unwrap();
            prop_assert_eq!(delta.apply(from), to);
        } else {
            prop_assert_eq!(from, to);
        }
    }

    #[test]
    fn prop_low_res_roundtrip(from in coord_strategy(), to in coord_strategy()) {
        let (a, b) = (from.low_resolution(), to.low_resolution());
        if let Some(packed) = encode_low_res(a, b).unwrap() {
            let mut writer = BitWriter::new();
            writer.write_packed(packed);
            let bytes = writer.finish();
            let delta = decode_low_res(&mut BitReader::new(&bytes)).unwrap();
            prop_assert_eq!(delta.apply_low(a), b);
        } else {
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn prop_skip_runs_sum(counts in prop::collection::vec(1u32..5000, 1..6)) {
        let mut writer = BitWriter::new();
        for count in &counts {
            write_skip_run(&mut writer, *count).unwrap();
        }
        let bits = writer.bits_written();
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        let mut total = 0;
        while reader.bit_position() < bits {
            prop_assert!(!reader.read_bool().unwrap());
            total += read_skip_run(&mut reader).unwrap();
        }
        prop_assert_eq!(total, counts.iter().sum::<u32>());
    }
}
