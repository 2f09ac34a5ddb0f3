use rusqlite::Connection;

pub fn create_tables(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        -- Usuarios y roles
        CREATE TABLE IF NOT EXISTS roles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS usuarios (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            rol_id INTEGER NOT NULL REFERENCES roles(id),
            activo INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Catalogos
        CREATE TABLE IF NOT EXISTS personal (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL,
            apellidos TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            telefono TEXT NOT NULL,
            porcentaje_comision REAL NOT NULL DEFAULT 50,
            activo INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS clientes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL,
            apellidos TEXT NOT NULL,
            cedula TEXT NOT NULL UNIQUE,
            email TEXT,
            telefono TEXT NOT NULL,
            instagram TEXT,
            tipo TEXT NOT NULL DEFAULT 'Spa',
            activo INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS proveedores (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tipo_documento TEXT NOT NULL DEFAULT 'NIT',
            numero_documento TEXT NOT NULL UNIQUE,
            razon_social TEXT NOT NULL,
            email TEXT,
            telefono TEXT,
            direccion TEXT,
            activo INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS precios (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            monto REAL NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS procedimientos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL UNIQUE,
            precio_id INTEGER REFERENCES precios(id),
            activo INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS bancos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL UNIQUE,
            activo INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS formas_pago (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL UNIQUE
        );

        -- Inventario de insumos
        CREATE TABLE IF NOT EXISTS unidades_medida (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL UNIQUE,
            abreviatura TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categorias (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL UNIQUE,
            descripcion TEXT,
            afecta_stock INTEGER NOT NULL DEFAULT 0,
            activo INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS articulos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL UNIQUE,
            descripcion TEXT,
            categoria_id INTEGER NOT NULL REFERENCES categorias(id),
            unidad_medida_id INTEGER NOT NULL REFERENCES unidades_medida(id),
            stock_minimo INTEGER NOT NULL DEFAULT 0,
            stock_actual REAL NOT NULL DEFAULT 0 CHECK (stock_actual >= 0),
            costo_unitario REAL NOT NULL DEFAULT 0,
            activo INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Actividades y pagos
        CREATE TABLE IF NOT EXISTS actividades (
            id TEXT PRIMARY KEY,
            personal_id INTEGER NOT NULL REFERENCES personal(id),
            cliente_id INTEGER REFERENCES clientes(id),
            procedimiento_id INTEGER REFERENCES procedimientos(id),
            precio_id INTEGER REFERENCES precios(id),
            usuario_id INTEGER NOT NULL REFERENCES usuarios(id),
            vales REAL NOT NULL DEFAULT 0,
            descripcion TEXT,
            estado TEXT NOT NULL DEFAULT 'Realizada',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pagos_actividad (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            actividad_id TEXT NOT NULL REFERENCES actividades(id) ON DELETE CASCADE,
            forma_pago_id INTEGER NOT NULL REFERENCES formas_pago(id),
            banco_id INTEGER REFERENCES bancos(id),
            monto REAL NOT NULL,
            referencia_pago TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS detalle_actividad (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            actividad_id TEXT NOT NULL REFERENCES actividades(id) ON DELETE CASCADE,
            articulo_id INTEGER NOT NULL REFERENCES articulos(id),
            cantidad REAL NOT NULL
        );

        -- Cierre de caja
        CREATE TABLE IF NOT EXISTS cierres_caja (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fecha TEXT NOT NULL,
            total_efectivo REAL NOT NULL DEFAULT 0,
            total_datafono REAL NOT NULL DEFAULT 0,
            total_transferencia REAL NOT NULL DEFAULT 0,
            total_vales REAL NOT NULL DEFAULT 0,
            total_ventas_dia REAL NOT NULL DEFAULT 0,
            total_efectivo_sistema REAL NOT NULL DEFAULT 0,
            total_efectivo_contado REAL NOT NULL DEFAULT 0,
            descuadre REAL NOT NULL DEFAULT 0,
            desglose_efectivo TEXT,
            observaciones TEXT,
            estado TEXT NOT NULL DEFAULT 'Consolidado',
            usuario_id INTEGER NOT NULL REFERENCES usuarios(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_cierre_consolidado_fecha
            ON cierres_caja(fecha) WHERE estado = 'Consolidado';

        -- Gastos
        CREATE TABLE IF NOT EXISTS gastos_adicionales (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            numero_factura TEXT NOT NULL UNIQUE,
            proveedor_id INTEGER NOT NULL REFERENCES proveedores(id),
            fecha_gasto TEXT NOT NULL,
            descripcion TEXT,
            valor_total REAL NOT NULL DEFAULT 0,
            estado TEXT NOT NULL DEFAULT 'Consolidado',
            usuario_id INTEGER NOT NULL REFERENCES usuarios(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS detalle_gasto_adicional (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            gasto_id INTEGER NOT NULL REFERENCES gastos_adicionales(id) ON DELETE CASCADE,
            articulo_id INTEGER NOT NULL REFERENCES articulos(id),
            cantidad REAL NOT NULL,
            precio_unitario REAL NOT NULL,
            subtotal REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS gastos_administrativos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            descripcion TEXT NOT NULL,
            estado TEXT NOT NULL DEFAULT 'Consolidado',
            usuario_id INTEGER NOT NULL REFERENCES usuarios(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS detalle_gasto_administrativo (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            gasto_id INTEGER NOT NULL REFERENCES gastos_administrativos(id) ON DELETE CASCADE,
            articulo_id INTEGER NOT NULL REFERENCES articulos(id),
            cantidad REAL NOT NULL
        );

        -- Ropa
        CREATE TABLE IF NOT EXISTS articulos_ropa (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL,
            descripcion TEXT,
            marca TEXT,
            color TEXT,
            talla TEXT,
            stock_actual INTEGER NOT NULL DEFAULT 0 CHECK (stock_actual >= 0),
            precio_compra REAL,
            precio_venta REAL NOT NULL,
            observacion TEXT,
            activo INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ventas_ropa (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cliente_id INTEGER REFERENCES clientes(id),
            total REAL NOT NULL DEFAULT 0,
            usuario_id INTEGER NOT NULL REFERENCES usuarios(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS detalle_venta_ropa (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            venta_id INTEGER NOT NULL REFERENCES ventas_ropa(id) ON DELETE CASCADE,
            articulo_ropa_id INTEGER NOT NULL REFERENCES articulos_ropa(id),
            cantidad INTEGER NOT NULL,
            precio_unitario REAL NOT NULL,
            subtotal REAL NOT NULL
        );

        -- Facturacion
        CREATE TABLE IF NOT EXISTS facturas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            numero TEXT NOT NULL UNIQUE,
            actividad_id TEXT NOT NULL UNIQUE REFERENCES actividades(id),
            cliente_id INTEGER NOT NULL REFERENCES clientes(id),
            total REAL NOT NULL,
            usuario_id INTEGER NOT NULL REFERENCES usuarios(id),
            created_at TEXT NOT NULL
        );

        -- Auditoria (solo anexado)
        CREATE TABLE IF NOT EXISTS auditoria (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            accion TEXT NOT NULL,
            tabla_afectada TEXT NOT NULL,
            registro_id TEXT NOT NULL,
            descripcion TEXT NOT NULL,
            usuario_id INTEGER NOT NULL,
            fecha TEXT NOT NULL
        );

        CREATE TRIGGER IF NOT EXISTS auditoria_sin_update
            BEFORE UPDATE ON auditoria
            BEGIN SELECT RAISE(ABORT, 'La auditoria no se puede modificar'); END;

        CREATE TRIGGER IF NOT EXISTS auditoria_sin_delete
            BEFORE DELETE ON auditoria
            BEGIN SELECT RAISE(ABORT, 'La auditoria no se puede eliminar'); END;

        -- Indices
        CREATE INDEX IF NOT EXISTS idx_actividades_fecha ON actividades(created_at);
        CREATE INDEX IF NOT EXISTS idx_actividades_personal ON actividades(personal_id);
        CREATE INDEX IF NOT EXISTS idx_pagos_actividad ON pagos_actividad(actividad_id);
        CREATE INDEX IF NOT EXISTS idx_gastos_adicionales_fecha ON gastos_adicionales(fecha_gasto);
        CREATE INDEX IF NOT EXISTS idx_auditoria_fecha ON auditoria(fecha);
        ",
    )?;

    Ok(())
}
