#![no_main]

use asic_model::{RegisterModel, REGISTER_SPACE_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut model = RegisterModel::default();

    for transaction in data.split(|byte| *byte == 0xA5) {
        let before = model.snapshot();
        let mut attempt = transaction.to_vec();

        match model.try_process(&mut attempt) {
            Ok(outcome) => {
                assert_eq!(attempt.len(), transaction.len());
                assert_eq!(attempt[0], transaction[0]);
                assert_eq!(outcome.length + 1, transaction.len());
            }
            Err(_) => {
                assert_eq!(attempt, transaction);
                assert_eq!(model.snapshot(), before);
            }
        }

        assert_eq!(model.registers().len(), REGISTER_SPACE_SIZE);
        assert!(model.test_sr_sector() < 32);
    }
});
