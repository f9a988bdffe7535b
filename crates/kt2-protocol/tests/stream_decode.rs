//! 同步 → 解码 → 组帧，串在一起跑一段带噪声的字节流

use bytes::BytesMut;
use kt2_protocol::{
    FrameAssembler, PACKET_BODY_LEN, Packet, ROWS_NARROW, RowOutcome, SAMPLES_PER_ROW,
    SYNC_LEN, SyncFinder,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn random_row(rng: &mut StdRng) -> Vec<i16> {
    (0..SAMPLES_PER_ROW).map(|_| rng.r#gen()).collect()
}

/// 不含 0x5A 的噪声，避免产生假的同步起点
fn noise(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len)
        .map(|_| loop {
            let b: u8 = rng.r#gen();
            if b != 0x5A {
                break b;
            }
        })
        .collect()
}

/// 逐包扫描：找同步字，截取 646 字节解码
fn scan(stream: &[u8]) -> Vec<Packet> {
    let mut finder = SyncFinder::new();
    let mut packets = Vec::new();
    let mut pos = 0;
    while let Some(offset) = finder.feed_slice(&stream[pos..]) {
        let body_start = pos + offset;
        let end = body_start + PACKET_BODY_LEN;
        if end > stream.len() {
            break;
        }
        packets.push(Packet::decode(&stream[body_start - SYNC_LEN..end]));
        finder.consume();
        pos = end;
    }
    packets
}

#[test]
fn noisy_stream_yields_exact_frames() {
    let mut rng = StdRng::seed_from_u64(0x4b54_32);
    let frames = 3;
    let mut expected = Vec::new();
    let mut stream = BytesMut::new();

    for _ in 0..frames {
        let mut rows = Vec::new();
        for row in 0..ROWS_NARROW {
            let gap = rng.gen_range(0..32);
            stream.extend_from_slice(&noise(&mut rng, gap));
            let samples = random_row(&mut rng);
            Packet::distance(row as u8, samples.clone())
                .encode_into(&mut stream)
                .unwrap();
            rows.push(samples);
        }
        expected.push(rows);
    }

    let packets = scan(&stream);
    assert_eq!(packets.len(), frames * ROWS_NARROW);

    let mut assembler = FrameAssembler::new(ROWS_NARROW);
    let mut completed = Vec::new();
    for packet in &packets {
        let outcome = assembler.push(packet);
        assert!(matches!(outcome.row, RowOutcome::Written { .. }));
        completed.extend(outcome.completed);
    }

    assert_eq!(completed.len(), frames);
    for (index, (frame, rows)) in completed.iter().zip(&expected).enumerate() {
        assert_eq!(frame.index, index as u64);
        for (row, samples) in rows.iter().enumerate() {
            assert_eq!(frame.row(row).unwrap(), samples.as_slice());
        }
    }
}

#[test]
fn truncated_tail_is_not_decoded() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut stream = BytesMut::new();
    for row in 0..2u8 {
        Packet::distance(row, random_row(&mut rng))
            .encode_into(&mut stream)
            .unwrap();
    }
    let cut = stream.len() - 100;
    let packets = scan(&stream[..cut]);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].row, 0);
}
