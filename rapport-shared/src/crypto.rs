use crate::error::Result;

/// RFC 5705 keying material export surface.
///
/// DTLS implements this to hand SRTP its master keys; anything else that
/// needs transport-bound secrets goes through the same label mechanism.
pub trait KeyingMaterialExporter {
    fn export_keying_material(
        &self,
        label: &str,
        context: &[u8],
        length: usize,
    ) -> Result<Vec<u8>>;
}
