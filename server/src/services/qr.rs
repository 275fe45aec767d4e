use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};

use crate::models::TicketId;

const MIN_SIZE_PX: u32 = 300;

/// Builds the QR symbol for a ticket. The payload is the bare ticket id.
///
/// Level H keeps the code readable after it is shrunk onto printed passes.
pub fn ticket_qr(ticket_id: &TicketId) -> Result<QrCode, QrError> {
    QrCode::with_error_correction_level(ticket_id.as_str().as_bytes(), EcLevel::H)
}

/// Renders the ticket QR code as a standalone SVG document.
pub fn ticket_qr_svg(ticket_id: &TicketId) -> Result<String, QrError> {
    let code = ticket_qr(ticket_id)?;
    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(MIN_SIZE_PX, MIN_SIZE_PX)
        .quiet_zone(true)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uses_high_error_correction() {
        let code = ticket_qr(&TicketId::generate()).unwrap();
        assert_eq!(code.error_correction_level(), EcLevel::H);
    }

    #[test]
    fn test_svg_document() {
        let svg = ticket_qr_svg(&TicketId::from("TKT-1700000000000-ABCDEFGHI".to_string())).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("#000000"));
    }

    #[test]
    fn test_same_ticket_same_symbol() {
        let id = TicketId::from("TKT-1700000000000-ABCDEFGHI".to_string());
        assert_eq!(ticket_qr_svg(&id).unwrap(), ticket_qr_svg(&id).unwrap());
    }
}
