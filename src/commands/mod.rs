pub mod actividades;
pub mod auditoria;
pub mod bancos;
pub mod caja;
pub mod clientes;
pub mod consumos;
pub mod dashboard;
pub mod exportar;
pub mod facturas;
pub mod gastos;
pub mod inventario;
pub mod personal;
pub mod precios;
pub mod procedimientos;
pub mod proveedores;
pub mod reportes;
pub mod ropa;
pub mod usuarios;

use rusqlite::types::ToSql;

use crate::error::AppError;
use crate::models::{Pagina, SesionActiva};
use crate::utils;

pub fn verificar_admin(sesion: &SesionActiva) -> Result<(), AppError> {
    if sesion.es_admin() {
        Ok(())
    } else {
        Err(AppError::NoAutorizado)
    }
}

/// Admin o Supervisor
pub fn verificar_supervisor(sesion: &SesionActiva) -> Result<(), AppError> {
    if sesion.es_supervisor() {
        Ok(())
    } else {
        Err(AppError::NoAutorizado)
    }
}

/// Condiciones WHERE armadas dinamicamente con sus parametros
#[derive(Default)]
pub(crate) struct Filtros {
    condiciones: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl Filtros {
    /// `condicion` usa `?` como marcador; se renumera al agregarla
    pub fn agregar<T: ToSql + 'static>(&mut self, condicion: &str, valor: T) {
        let n = self.params.len() + 1;
        self.condiciones.push(condicion.replace('?', &format!("?{}", n)));
        self.params.push(Box::new(valor));
    }

    /// Condicion con el mismo valor repetido en varios `?`
    pub fn agregar_texto(&mut self, condicion: &str, texto: &str) {
        let n = self.params.len() + 1;
        self.condiciones.push(condicion.replace('?', &format!("?{}", n)));
        self.params.push(Box::new(format!("%{}%", texto)));
    }

    pub fn where_sql(&self) -> String {
        if self.condiciones.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.condiciones.join(" AND "))
        }
    }

    pub fn refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

pub(crate) fn paginar<T>(
    consultar: impl FnOnce(i64, i64) -> Result<Vec<T>, AppError>,
    total: i64,
    pagina: i64,
    por_pagina: i64,
) -> Result<Pagina<T>, AppError> {
    let (pagina, offset) = utils::paginar(pagina, total, por_pagina);
    Ok(Pagina {
        items: consultar(por_pagina, offset)?,
        pagina,
        total_paginas: utils::total_paginas(total, por_pagina),
        total,
    })
}

#[cfg(test)]
pub(crate) mod pruebas {
    //! Datos de apoyo para las pruebas de los comandos

    use crate::db::Database;
    use crate::models::{Rol, SesionActiva};

    pub fn sesion(rol: Rol) -> SesionActiva {
        SesionActiva {
            usuario_id: 1,
            nombre: "ADMINISTRADOR".to_string(),
            username: "admin".to_string(),
            rol,
            csrf: "csrf".to_string(),
        }
    }

    pub fn admin() -> SesionActiva {
        sesion(Rol::Admin)
    }

    pub fn empleado() -> SesionActiva {
        sesion(Rol::Empleado)
    }

    pub fn personal(db: &Database, nombre: &str, email: &str) -> i64 {
        let conn = db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO personal (nombre, apellidos, email, telefono, porcentaje_comision, created_at, updated_at)
             VALUES (?1, 'PRUEBA', ?2, '3101234567', 50, '2026-01-01 08:00:00', '2026-01-01 08:00:00')",
            rusqlite::params![nombre, email],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub fn cliente(db: &Database, nombre: &str, cedula: &str) -> i64 {
        let conn = db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO clientes (nombre, apellidos, cedula, telefono, tipo, created_at, updated_at)
             VALUES (?1, 'CLIENTE', ?2, '3001234567', 'Spa', '2026-01-01 08:00:00', '2026-01-01 08:00:00')",
            rusqlite::params![nombre, cedula],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    /// Procedimiento con su precio; devuelve (procedimiento_id, precio_id)
    pub fn procedimiento(db: &Database, nombre: &str, monto: f64) -> (i64, i64) {
        let conn = db.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO precios (monto, created_at) VALUES (?1, '2026-01-01 08:00:00')",
            rusqlite::params![monto],
        )
        .unwrap();
        let precio_id: i64 = conn
            .query_row(
                "SELECT id FROM precios WHERE monto = ?1",
                rusqlite::params![monto],
                |r| r.get(0),
            )
            .unwrap();
        conn.execute(
            "INSERT INTO procedimientos (nombre, precio_id, created_at, updated_at)
             VALUES (?1, ?2, '2026-01-01 08:00:00', '2026-01-01 08:00:00')",
            rusqlite::params![nombre, precio_id],
        )
        .unwrap();
        (conn.last_insert_rowid(), precio_id)
    }

    /// Articulo en la categoria de insumos (afecta stock)
    pub fn articulo(db: &Database, nombre: &str, stock: f64) -> i64 {
        let conn = db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO articulos (nombre, categoria_id, unidad_medida_id, stock_minimo, stock_actual, costo_unitario, created_at, updated_at)
             VALUES (?1,
                     (SELECT id FROM categorias WHERE nombre = 'INSUMOS DE MANICURA'),
                     (SELECT id FROM unidades_medida WHERE nombre = 'Unidad'),
                     1, ?2, 1000, '2026-01-01 08:00:00', '2026-01-01 08:00:00')",
            rusqlite::params![nombre, stock],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub fn proveedor(db: &Database, razon_social: &str, documento: &str) -> i64 {
        let conn = db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO proveedores (tipo_documento, numero_documento, razon_social, created_at, updated_at)
             VALUES ('NIT', ?1, ?2, '2026-01-01 08:00:00', '2026-01-01 08:00:00')",
            rusqlite::params![documento, razon_social],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub fn forma_pago(db: &Database, nombre: &str) -> i64 {
        let conn = db.conn.lock().unwrap();
        conn.query_row(
            "SELECT id FROM formas_pago WHERE nombre = ?1",
            rusqlite::params![nombre],
            |r| r.get(0),
        )
        .unwrap()
    }

    pub fn stock(db: &Database, articulo_id: i64) -> f64 {
        let conn = db.conn.lock().unwrap();
        conn.query_row(
            "SELECT stock_actual FROM articulos WHERE id = ?1",
            rusqlite::params![articulo_id],
            |r| r.get(0),
        )
        .unwrap()
    }

    pub fn contar(db: &Database, sql: &str) -> i64 {
        let conn = db.conn.lock().unwrap();
        conn.query_row(sql, [], |r| r.get(0)).unwrap()
    }
}
