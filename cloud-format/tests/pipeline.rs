use approx::assert_relative_eq;
use cloud_format::{
    drain_into, wire, Aggregator, AggregatorConfig, BufferCapacity, DirectorySource, ExportFormat,
    FramedSource, FramedWriter, Header, PointCloudMessage, PointField, PointFieldDatatype,
    SessionRecorder, ZAxis,
};
use std::{num::NonZeroUsize, sync::atomic::AtomicBool, sync::Arc, thread};

fn scan(seq: u32, points: &[[f32; 3]]) -> PointCloudMessage {
    // x, y, z, intensity records with two bytes of row padding
    let point_step = 16;
    let mut data = vec![];
    for &[x, y, z] in points {
        for value in [x, y, z, 100.0] {
            data.extend(value.to_le_bytes());
        }
    }
    data.extend([0xEE, 0xEE]);

    PointCloudMessage {
        header: Header {
            seq,
            timestamp_sec: 1_700_000_000 + seq as i64,
            timestamp_nsec: 0,
            frame_id: b"world".to_vec(),
        },
        height: 1,
        width: points.len() as u32,
        fields: vec![
            PointField::new("x", 0, PointFieldDatatype::Float32, 1),
            PointField::new("y", 4, PointFieldDatatype::Float32, 1),
            PointField::new("z", 8, PointFieldDatatype::Float32, 1),
            PointField::new("intensity", 12, PointFieldDatatype::Float32, 1),
        ],
        is_bigendian: false,
        point_step,
        row_step: point_step * points.len() as u32 + 2,
        data,
        is_dense: true,
        num_echoes: 1,
        segment_idx: seq,
    }
}

fn read_pcd(path: &std::path::Path) -> Vec<[f32; 3]> {
    pcd_rs::DynReader::open(path)
        .unwrap()
        .map(|record| {
            let xyz: [f32; 3] = record.unwrap().to_xyz().unwrap();
            xyz
        })
        .collect()
}

#[test]
fn recorded_session_reconstructs_with_scaled_index() {
    let dir = tempfile::tempdir().unwrap();
    let session_dir = dir.path().join("session");

    let mut recorder = SessionRecorder::create_in(&session_dir).unwrap();
    for seq in 0..3 {
        recorder
            .record(&scan(seq, &[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]))
            .unwrap();
    }

    let mut source = DirectorySource::open(&session_dir).unwrap();
    let aggregator = Aggregator::new(AggregatorConfig::default());
    let stats = drain_into(&mut source, &aggregator, &AtomicBool::new(false));
    assert_eq!(stats.appended, 3);

    let output = dir.path().join("cloud.pcd");
    assert_eq!(aggregator.export(&output, ExportFormat::Pcd).unwrap(), 6);

    let points = read_pcd(&output);
    assert_eq!(points.len(), 6);
    for (idx, [x, y, z]) in points.into_iter().enumerate() {
        let frame = idx / 2;
        assert_eq!(x, if idx % 2 == 0 { 1.0 } else { 4.0 });
        assert_eq!(y, if idx % 2 == 0 { 2.0 } else { 5.0 });
        assert_relative_eq!(z, frame as f32 * 0.01);
    }
}

#[test]
fn wire_round_trip_keeps_padding_and_unused_fields() {
    let msg = scan(9, &[[1.0, 2.0, 3.0]]);
    let decoded = wire::decode(&wire::encode(&msg)).unwrap();

    assert_eq!(decoded, msg);
    assert_eq!(decoded.data[16..], [0xEE, 0xEE]);
    assert_eq!(decoded.fields[3].name, "intensity");
    assert_eq!(decoded.fields[3].datatype, PointFieldDatatype::Float32);
}

#[test]
fn ring_buffer_export_keeps_recent_frames() {
    let config = AggregatorConfig {
        buffer_capacity: BufferCapacity::Bounded(NonZeroUsize::new(2).unwrap()),
        z_axis: Some(ZAxis::Sensor),
        ..Default::default()
    };
    let aggregator = Aggregator::new(config);
    for seq in 0..5 {
        aggregator
            .append(&scan(seq, &[[seq as f32, 0.0, seq as f32 * 10.0]]))
            .unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("recent.pcd");
    aggregator.export(&output, ExportFormat::PcdAscii).unwrap();

    assert_eq!(read_pcd(&output), vec![[3.0, 0.0, 30.0], [4.0, 0.0, 40.0]]);
}

#[test]
fn empty_session_exports_valid_files() {
    let aggregator = Aggregator::new(AggregatorConfig::default());
    let dir = tempfile::tempdir().unwrap();

    for format in [ExportFormat::Ply, ExportFormat::RawBin] {
        let output = dir.path().join(format!("empty.{}", format.extension()));
        assert_eq!(aggregator.export(&output, format).unwrap(), 0);
        assert!(output.exists());
    }
}

#[test]
fn producer_and_consumer_share_aggregator() {
    let dir = tempfile::tempdir().unwrap();
    let stream_path = dir.path().join("session.frames");
    {
        let mut writer = FramedWriter::create(&stream_path).unwrap();
        for seq in 0..20 {
            writer.write(&scan(seq, &[[0.0, 1.0, 2.0]])).unwrap();
        }
        writer.flush().unwrap();
    }

    let aggregator = Arc::new(Aggregator::new(AggregatorConfig::default()));
    let cancel = Arc::new(AtomicBool::new(false));

    let producer = {
        let aggregator = aggregator.clone();
        let cancel = cancel.clone();
        thread::spawn(move || {
            let mut source = FramedSource::open(&stream_path).unwrap();
            drain_into(&mut source, &aggregator, &cancel)
        })
    };

    // snapshots taken while the producer runs only ever see whole frames
    for _ in 0..10 {
        let snapshot = aggregator.snapshot();
        let seqs: Vec<_> = snapshot.frames().iter().map(|frame| frame.seq).collect();
        assert_eq!(seqs, (0..seqs.len() as u64).collect::<Vec<_>>());
        assert_eq!(snapshot.points().count(), snapshot.num_points());
    }

    let stats = producer.join().unwrap();
    assert_eq!(stats.appended, 20);

    let finished = aggregator.drain();
    assert_eq!(finished.num_points(), 20);
    let output = dir.path().join("cloud.ply");
    finished.export(&output, ExportFormat::Ply).unwrap();
    assert!(aggregator.is_empty());
}
