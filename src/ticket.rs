use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use thiserror::Error;

//////////////////////////////////////////////////////////
// Ticket QR rendering
//////////////////////////////////////////////////////////

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("PNG rendering failed: {0}")]
    Render(#[from] image::ImageError),
}

/// Encodes the ticket identifier as a QR code and renders it to an
/// in-memory PNG, sized for a phone screen.
pub fn ticket_png(identifier: &str) -> Result<Vec<u8>, TicketError> {
    let code = QrCode::new(identifier.as_bytes())?;
    let qr = code
        .render::<Luma<u8>>()
        .min_dimensions(250, 250)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(qr).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}
