//! Device certificate and serial rendering for provisioning output.

use super::SecureElement;
use super::error::Error;
use base64ct::{Base64, Encoding as B64Encoding};
use core::fmt::Write as _;
use heapless::String;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----\n";
const PEM_END: &str = "-----END CERTIFICATE-----\n";
/// Raw bytes per 64-column base64 line.
const BYTES_PER_LINE: usize = 48;

/// Length of the PEM text produced for `der_len` bytes of DER.
pub fn pem_len(der_len: usize) -> usize {
    let lines = der_len.div_ceil(BYTES_PER_LINE);
    PEM_BEGIN.len() + der_len.div_ceil(3) * 4 + lines + PEM_END.len()
}

/// Render a DER certificate as a PEM block.
pub fn encode_pem<'o>(der: &[u8], out: &'o mut [u8]) -> Result<&'o str, Error> {
    if der.is_empty() {
        return Err(Error::BadParam);
    }
    if out.len() < pem_len(der.len()) {
        return Err(Error::BufferTooSmall);
    }

    let mut pos = 0;
    push(out, &mut pos, PEM_BEGIN.as_bytes())?;
    for line in der.chunks(BYTES_PER_LINE) {
        let written = Base64::encode(line, &mut out[pos..])
            .map_err(|_| Error::BufferTooSmall)?
            .len();
        pos += written;
        push(out, &mut pos, b"\n")?;
    }
    push(out, &mut pos, PEM_END.as_bytes())?;

    core::str::from_utf8(&out[..pos]).map_err(|_| Error::BadParam)
}

/// Read the device certificate from the secure element and render it as PEM.
pub fn device_certificate_pem<'o, S: SecureElement>(
    secure_element: &mut S,
    der_buf: &mut [u8],
    out: &'o mut [u8],
) -> Result<&'o str, Error> {
    let len = secure_element
        .device_certificate(der_buf)
        .map_err(|_| Error::ReadError)?;
    if len > der_buf.len() {
        return Err(Error::BufferTooSmall);
    }
    encode_pem(&der_buf[..len], out)
}

/// The secure element serial number as upper-case hex.
pub fn serial_number_hex<S: SecureElement>(secure_element: &mut S) -> Result<String<18>, Error> {
    let serial = secure_element
        .serial_number()
        .map_err(|_| Error::ReadError)?;
    let mut hex = String::new();
    for byte in serial {
        write!(hex, "{:02X}", byte).map_err(|_| Error::BufferTooSmall)?;
    }
    Ok(hex)
}

fn push(out: &mut [u8], pos: &mut usize, bytes: &[u8]) -> Result<(), Error> {
    let end = *pos + bytes.len();
    if end > out.len() {
        return Err(Error::BufferTooSmall);
    }
    out[*pos..end].copy_from_slice(bytes);
    *pos = end;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ReadStorage, Storage};

    /// A chip with a tiny DER certificate and a fixed serial.
    struct FakeChip {
        certificate: &'static [u8],
        reported_len: Option<usize>,
        fail: bool,
    }

    impl FakeChip {
        fn new() -> Self {
            Self {
                certificate: &[0x30, 0x03, 0x02, 0x01, 0x05],
                reported_len: None,
                fail: false,
            }
        }
    }

    impl ReadStorage for FakeChip {
        type Error = Error;

        fn read(&mut self, _offset: u32, _bytes: &mut [u8]) -> Result<(), Self::Error> {
            Ok(())
        }

        fn capacity(&self) -> usize {
            0
        }
    }

    impl Storage for FakeChip {
        fn write(&mut self, _offset: u32, _bytes: &[u8]) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    impl SecureElement for FakeChip {
        fn serial_number(&mut self) -> Result<[u8; 9], Self::Error> {
            if self.fail {
                return Err(Error::ReadError);
            }
            Ok([0x01, 0x23, 0xAB, 0xCD, 0xEF, 0x00, 0x11, 0xEE, 0x7F])
        }

        fn device_certificate(&mut self, out: &mut [u8]) -> Result<usize, Self::Error> {
            if self.fail {
                return Err(Error::ReadError);
            }
            let len = self.certificate.len().min(out.len());
            out[..len].copy_from_slice(&self.certificate[..len]);
            Ok(self.reported_len.unwrap_or(self.certificate.len()))
        }
    }

    #[test]
    fn test_device_certificate_pem() {
        let mut chip = FakeChip::new();
        let mut der = [0u8; 32];
        let mut out = [0u8; 128];
        let pem = device_certificate_pem(&mut chip, &mut der, &mut out).unwrap();
        assert_eq!(
            pem,
            "-----BEGIN CERTIFICATE-----\nMAMCAQU=\n-----END CERTIFICATE-----\n"
        );
    }

    #[test]
    fn test_device_certificate_errors() {
        let mut der = [0u8; 32];
        let mut out = [0u8; 128];

        let mut chip = FakeChip::new();
        chip.fail = true;
        assert_eq!(
            device_certificate_pem(&mut chip, &mut der, &mut out),
            Err(Error::ReadError)
        );

        let mut chip = FakeChip::new();
        chip.reported_len = Some(64);
        assert_eq!(
            device_certificate_pem(&mut chip, &mut der, &mut out),
            Err(Error::BufferTooSmall)
        );
    }

    #[test]
    fn test_serial_number_hex() {
        let mut chip = FakeChip::new();
        assert_eq!(serial_number_hex(&mut chip).unwrap().as_str(), "0123ABCDEF0011EE7F");

        chip.fail = true;
        assert_eq!(serial_number_hex(&mut chip), Err(Error::ReadError));
    }

    #[test]
    fn test_pem_wraps_at_64_columns() {
        let der = [0xABu8; 100];
        let mut out = [0u8; 256];
        let pem = encode_pem(&der, &mut out).unwrap();
        let body: Vec<&str> = pem.lines().collect();
        assert_eq!(body[0], "-----BEGIN CERTIFICATE-----");
        assert_eq!(body[1].len(), 64);
        assert_eq!(body[2].len(), 64);
        assert_eq!(body[3].len(), 8);
        assert_eq!(body[4], "-----END CERTIFICATE-----");
        assert_eq!(pem.len(), pem_len(der.len()));
    }

    #[test]
    fn test_pem_buffer_too_small() {
        let der = [1u8; 10];
        let mut out = [0u8; 20];
        assert_eq!(encode_pem(&der, &mut out), Err(Error::BufferTooSmall));
    }
}
