//! Protocol module - Senso control protocol definitions.

pub mod command;
pub mod constants;
pub mod header;
pub mod response;

pub use command::Command;
pub use constants::*;
pub use header::{BlockHeader, BlockHeaders, ControlFrame, FrameHeader};
pub use response::{Block, Responder, Response, ResponseFrame};

/// Whether a recorded frame carries sensor data (type marker at absolute
/// offset 10).
pub fn is_sensor_frame(frame: &[u8]) -> bool {
    frame.get(DATA_TYPE_OFFSET) == Some(&DATA_TYPE_SENSOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_frame_filter() {
        let mut frame = vec![1, 1, 0, 0, 0, 0, 0, 0, 4, 0, 0x80, 0, 1, 2, 3, 4];
        assert!(is_sensor_frame(&frame));
        frame[10] = 0x01;
        assert!(!is_sensor_frame(&frame));
        assert!(!is_sensor_frame(&frame[..10]));
    }
}
