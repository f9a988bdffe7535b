//! 单生产者/单消费者 FIFO 性质

use kt2_driver::RingBuffer;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// 任意分块追加、任意大小读取，消费者看到的是所有块按序拼接
    #[test]
    fn consumer_sees_exact_concatenation(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 1..32),
        read_sizes in prop::collection::vec(1usize..50, 1..64),
    ) {
        let expected: Vec<u8> = chunks.concat();
        let total = expected.len();

        let ring = Arc::new(RingBuffer::new());
        let producer = {
            let ring = ring.clone();
            thread::spawn(move || {
                for chunk in chunks {
                    ring.append(&chunk);
                    thread::yield_now();
                }
            })
        };

        let mut seen = Vec::with_capacity(total);
        let mut sizes = read_sizes.iter().cycle();
        while seen.len() < total {
            let n = (*sizes.next().unwrap()).min(total - seen.len());
            seen.extend(ring.read(n, n).unwrap());
        }

        producer.join().unwrap();
        prop_assert_eq!(seen, expected);
        prop_assert!(ring.is_empty());
    }

    /// peek n / pop < n 的读取不丢也不重复字节
    #[test]
    fn peek_and_partial_pop_preserve_order(
        data in prop::collection::vec(any::<u8>(), 8..256),
    ) {
        let ring = RingBuffer::new();
        ring.append(&data);

        let mut seen = Vec::new();
        while ring.len() >= 4 {
            let window = ring.read(4, 1).unwrap();
            seen.push(window[0]);
        }
        let rest = ring.len();
        seen.extend(ring.read(rest, rest).unwrap());
        prop_assert_eq!(seen, data);
    }
}
