//! Facturas en PDF: tamaño carta y ticket de 80mm.

use std::path::Path;

use genpdf::elements::{Break, FrameCellDecorator, LinearLayout, Paragraph, TableLayout};
use genpdf::style::{Color, Style};
use genpdf::{Alignment, Document, Element, Margins, SimplePageDecorator};

use crate::config::Negocio;
use crate::error::AppError;
use crate::models::{Factura, FormatoFactura};
use crate::utils::formatear_moneda;

fn cargar_fuentes(fonts_dir: &Path) -> Result<genpdf::fonts::FontFamily<genpdf::fonts::FontData>, AppError> {
    genpdf::fonts::from_files(fonts_dir, "LiberationSans", None).map_err(|e| {
        AppError::Pdf(format!(
            "Error cargando fuentes: {}. Copie LiberationSans-*.ttf en {}",
            e,
            fonts_dir.display()
        ))
    })
}

/// Celda con padding
fn celda(texto: &str, style: Style) -> impl Element {
    Paragraph::new(texto).styled(style).padded(Margins::trbl(1, 1, 1, 3))
}

fn celda_derecha(texto: &str, style: Style) -> impl Element {
    Paragraph::new(texto)
        .aligned(Alignment::Right)
        .styled(style)
        .padded(Margins::trbl(1, 3, 1, 1))
}

fn centrado(texto: &str, style: Style) -> impl Element {
    Paragraph::new(texto).aligned(Alignment::Center).styled(style)
}

fn renderizar(doc: Document) -> Result<Vec<u8>, AppError> {
    let mut buffer = Vec::new();
    doc.render(&mut buffer)
        .map_err(|e| AppError::Pdf(format!("Error generando PDF: {}", e)))?;
    Ok(buffer)
}

pub fn factura_pdf(
    factura: &Factura,
    formato: FormatoFactura,
    negocio: &Negocio,
    fonts_dir: &Path,
) -> Result<Vec<u8>, AppError> {
    let fuentes = cargar_fuentes(fonts_dir)?;
    match formato {
        FormatoFactura::Carta => carta(factura, negocio, fuentes),
        FormatoFactura::Ticket => ticket(factura, negocio, fuentes),
    }
}

fn carta(
    factura: &Factura,
    negocio: &Negocio,
    fuentes: genpdf::fonts::FontFamily<genpdf::fonts::FontData>,
) -> Result<Vec<u8>, AppError> {
    let mut doc = Document::new(fuentes);
    doc.set_title(format!("Factura {}", factura.numero));
    doc.set_paper_size(genpdf::PaperSize::Letter);
    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(Margins::trbl(15, 15, 15, 15));
    doc.set_page_decorator(decorator);

    let s_normal = Style::new().with_font_size(10);
    let s_bold = Style::new().with_font_size(10).bold();
    let s_titulo = Style::new().with_font_size(16).bold();
    let s_total = Style::new().with_font_size(12).bold();
    let s_pie = Style::new().with_font_size(8).with_color(Color::Greyscale(128));

    // Encabezado: negocio a la izquierda, numero a la derecha
    let mut encabezado = TableLayout::new(vec![3, 2]);
    encabezado.set_cell_decorator(FrameCellDecorator::new(true, true, false));
    let mut emisor = LinearLayout::vertical();
    emisor.push(celda(&negocio.nombre, s_titulo));
    if !negocio.nit.is_empty() {
        emisor.push(celda(&format!("NIT: {}", negocio.nit), s_normal));
    }
    if !negocio.direccion.is_empty() {
        emisor.push(celda(&negocio.direccion, s_normal));
    }
    if !negocio.email.is_empty() {
        emisor.push(celda(&negocio.email, s_normal));
    }
    let mut documento = LinearLayout::vertical();
    documento.push(celda("FACTURA DE VENTA", s_bold));
    documento.push(celda(&format!("No. {}", factura.numero), s_titulo));
    documento.push(celda(&format!("Fecha: {}", factura.fecha), s_normal));
    encabezado
        .row()
        .element(emisor)
        .element(documento)
        .push()
        .map_err(|e| AppError::Pdf(format!("Error en encabezado: {}", e)))?;
    doc.push(encabezado);
    doc.push(Break::new(1.5));

    // Cliente
    let mut cliente = LinearLayout::vertical();
    cliente.push(celda(&format!("Cliente: {}", factura.cliente), s_bold));
    cliente.push(celda(&format!("Cedula: {}", factura.cedula), s_normal));
    cliente.push(celda(&format!("Telefono: {}", factura.telefono), s_normal));
    if let Some(email) = &factura.email {
        cliente.push(celda(&format!("Email: {}", email), s_normal));
    }
    doc.push(cliente.padded(Margins::trbl(2, 2, 2, 2)).framed());
    doc.push(Break::new(1.5));

    // Detalle
    let mut detalle = TableLayout::new(vec![6, 3, 2]);
    detalle.set_cell_decorator(FrameCellDecorator::new(true, true, false));
    detalle
        .row()
        .element(celda("Procedimiento", s_bold))
        .element(celda("Atendido por", s_bold))
        .element(celda_derecha("Valor", s_bold))
        .push()
        .map_err(|e| AppError::Pdf(format!("Error en detalle: {}", e)))?;
    detalle
        .row()
        .element(celda(&factura.procedimiento, s_normal))
        .element(celda(&factura.personal, s_normal))
        .element(celda_derecha(&formatear_moneda(factura.total), s_normal))
        .push()
        .map_err(|e| AppError::Pdf(format!("Error en detalle: {}", e)))?;
    doc.push(detalle);
    doc.push(Break::new(1.0));

    // Pagos y total
    let mut totales = TableLayout::new(vec![8, 3]);
    totales.set_cell_decorator(FrameCellDecorator::new(true, true, false));
    for (forma, monto) in &factura.pagos {
        totales
            .row()
            .element(celda(forma, s_normal))
            .element(celda_derecha(&formatear_moneda(*monto), s_normal))
            .push()
            .map_err(|e| AppError::Pdf(format!("Error en pagos: {}", e)))?;
    }
    totales
        .row()
        .element(celda("TOTAL", s_total))
        .element(celda_derecha(&formatear_moneda(factura.total), s_total))
        .push()
        .map_err(|e| AppError::Pdf(format!("Error en totales: {}", e)))?;
    doc.push(totales);
    doc.push(Break::new(2.5));
    doc.push(centrado("Gracias por su visita", s_pie));

    renderizar(doc)
}

fn ticket(
    factura: &Factura,
    negocio: &Negocio,
    fuentes: genpdf::fonts::FontFamily<genpdf::fonts::FontData>,
) -> Result<Vec<u8>, AppError> {
    let mut doc = Document::new(fuentes);
    doc.set_title(format!("Ticket {}", factura.numero));
    // 80mm de ancho; alto estimado segun el numero de pagos
    let alto = 140 + 6 * factura.pagos.len() as i32;
    doc.set_paper_size(genpdf::Size::new(80, alto));
    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(Margins::trbl(3, 3, 3, 3));
    doc.set_page_decorator(decorator);

    let s_titulo = Style::new().with_font_size(10).bold();
    let s_normal = Style::new().with_font_size(7);
    let s_bold = Style::new().with_font_size(7).bold();
    let s_total = Style::new().with_font_size(9).bold();

    doc.push(centrado(&negocio.nombre, s_titulo));
    if !negocio.nit.is_empty() {
        doc.push(centrado(&format!("NIT: {}", negocio.nit), s_normal));
    }
    if !negocio.direccion.is_empty() {
        doc.push(centrado(&negocio.direccion, s_normal));
    }
    doc.push(Break::new(0.5));
    doc.push(Paragraph::new(format!("Factura No: {}", factura.numero)).styled(s_bold));
    doc.push(Paragraph::new(format!("Fecha: {}", factura.fecha)).styled(s_normal));
    doc.push(Paragraph::new(format!("Cliente: {}", factura.cliente)).styled(s_normal));
    doc.push(Paragraph::new(format!("C.C.: {}", factura.cedula)).styled(s_normal));
    doc.push(Break::new(0.5));
    doc.push(Paragraph::new(factura.procedimiento.as_str()).styled(s_bold));
    doc.push(Paragraph::new(format!("Atendido por: {}", factura.personal)).styled(s_normal));
    doc.push(Break::new(0.5));
    for (forma, monto) in &factura.pagos {
        doc.push(
            Paragraph::new(format!("{}: {}", forma, formatear_moneda(*monto))).styled(s_normal),
        );
    }
    doc.push(Break::new(0.5));
    doc.push(
        Paragraph::new(format!("TOTAL: {}", formatear_moneda(factura.total)))
            .aligned(Alignment::Right)
            .styled(s_total),
    );
    doc.push(Break::new(1.0));
    doc.push(centrado("Gracias por su visita", s_normal));

    renderizar(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factura() -> Factura {
        Factura {
            id: 1,
            numero: "F-0001".into(),
            actividad_id: "a".into(),
            fecha: "2026-03-10 10:00:00".into(),
            cliente: "ANA CLIENTE".into(),
            cedula: "1010".into(),
            telefono: "3001234567".into(),
            email: None,
            personal: "SOFIA PRUEBA".into(),
            procedimiento: "MANICURA".into(),
            total: 30000.0,
            pagos: vec![("Efectivo".into(), 30000.0)],
        }
    }

    #[test]
    fn test_sin_fuentes_es_error_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let negocio = Negocio {
            nombre: "DAMARIS SPA".into(),
            nit: String::new(),
            direccion: String::new(),
            email: String::new(),
        };
        assert!(matches!(
            factura_pdf(&factura(), FormatoFactura::Ticket, &negocio, dir.path()),
            Err(AppError::Pdf(_))
        ));
    }
}
