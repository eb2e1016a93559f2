/// Calculate CRC16 checksum (MODBUS RTU)
///
/// Register seeded with 0xFFFF, reflected polynomial 0xA001. Written to the
/// wire low byte first.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;

    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_read_ten_registers() {
        let crc = crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]);
        assert_eq!(crc, 0xCDC5);
        assert_eq!(crc.to_le_bytes(), [0xC5, 0xCD]);
    }

    #[test]
    fn test_crc16_read_one_register() {
        assert_eq!(crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0x0A84);
    }

    #[test]
    fn test_crc16_empty_data() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn test_crc16_appended_frame_checks_to_zero() {
        let mut frame = vec![0x11, 0x03, 0x00, 0x6B, 0x00, 0x03];
        let crc = crc16(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        assert_eq!(crc16(&frame), 0x0000);
    }
}
