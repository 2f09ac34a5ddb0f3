use tracing::info;

use super::{actividades, inventario};
use crate::db::Database;
use crate::error::AppError;
use crate::models::{FiltroActividades, FiltroArticulos};

/// BOM UTF-8 para que Excel abra correctamente caracteres especiales
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Escritor CSV con punto y coma (Excel en español)
fn escritor() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(BOM.to_vec())
}

fn terminar(escritor: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, AppError> {
    escritor
        .into_inner()
        .map_err(|e| AppError::Exportacion(e.to_string()))
}

fn monto(valor: f64) -> String {
    format!("{:.2}", valor)
}

pub fn inventario_csv(db: &Database, filtro: &FiltroArticulos) -> Result<Vec<u8>, AppError> {
    let articulos = inventario::articulos_filtrados(db, filtro)?;
    let mut csv = escritor();
    csv.write_record([
        "Nombre",
        "Descripcion",
        "Categoria",
        "Unidad",
        "Stock Minimo",
        "Stock Actual",
        "Costo Unitario",
        "Estado",
    ])?;
    for a in &articulos {
        csv.write_record([
            a.nombre.clone(),
            a.descripcion.clone().unwrap_or_default(),
            a.categoria.clone(),
            a.unidad.clone(),
            a.stock_minimo.to_string(),
            format!("{:.3}", a.stock_actual),
            monto(a.costo_unitario),
            if a.stock_bajo() { "STOCK BAJO" } else { "OK" }.to_string(),
        ])?;
    }
    info!(filas = articulos.len(), "inventory exported");
    terminar(csv)
}

/// Detalle de servicios con la parte del personal y del negocio, mas fila de totales
pub fn pagos_diarios_csv(db: &Database, filtro: &FiltroActividades) -> Result<Vec<u8>, AppError> {
    let servicios = actividades::servicios_pagados(db, filtro)?;
    let mut csv = escritor();
    csv.write_record([
        "Fecha",
        "Personal",
        "Procedimiento",
        "Monto",
        "Parte Personal",
        "Parte Negocio",
    ])?;

    let (mut total, mut personal, mut negocio) = (0.0, 0.0, 0.0);
    for s in &servicios {
        total += s.monto;
        personal += s.parte_personal;
        negocio += s.parte_negocio;
        csv.write_record([
            s.fecha.clone(),
            s.personal.clone(),
            s.procedimiento.clone(),
            monto(s.monto),
            monto(s.parte_personal),
            monto(s.parte_negocio),
        ])?;
    }
    csv.write_record([
        "TOTALES".to_string(),
        String::new(),
        String::new(),
        monto(total),
        monto(personal),
        monto(negocio),
    ])?;
    info!(filas = servicios.len(), "staff payments exported");
    terminar(csv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pruebas;

    #[test]
    fn test_inventario_con_bom_y_punto_y_coma() {
        let db = Database::en_memoria().unwrap();
        pruebas::articulo(&db, "ESMALTE; ROJO", 0.5);
        let bytes = inventario_csv(&db, &FiltroArticulos::default()).unwrap();

        assert!(bytes.starts_with(BOM));
        let texto = String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap();
        let lineas: Vec<&str> = texto.lines().collect();
        assert!(lineas[0].starts_with("Nombre;Descripcion;Categoria"));
        assert!(lineas[1].starts_with("\"ESMALTE; ROJO\";;INSUMOS DE MANICURA;und;1;0.500;1000.00;STOCK BAJO"));
    }

    #[test]
    fn test_pagos_sin_servicios_solo_totales() {
        let db = Database::en_memoria().unwrap();
        let bytes = pagos_diarios_csv(&db, &FiltroActividades::default()).unwrap();
        let texto = String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap();
        assert_eq!(texto.lines().nth(1), Some("TOTALES;;;0.00;0.00;0.00"));
    }
}
