use tracing::{info, warn};

use super::verificar_supervisor;
use crate::db::Database;
use crate::error::{es_restriccion, AppError};
use crate::models::{
    CambioPassword, EdicionUsuario, ItemCatalogo, NuevoUsuario, Rol, SesionActiva, UsuarioInfo,
};
use crate::utils;

const PASSWORD_MIN: usize = 6;

/// Verifica usuario y password. Si coinciden devuelve la sesion nueva.
pub fn iniciar_sesion(
    db: &Database,
    username: &str,
    password: &str,
) -> Result<SesionActiva, AppError> {
    let username = username.trim();
    let mut errores = Vec::new();
    if username.is_empty() {
        errores.push("El Usuario es Obligatorio".to_string());
    }
    if password.is_empty() {
        errores.push("El Password es Obligatorio".to_string());
    }
    if !errores.is_empty() {
        return Err(AppError::Validacion(errores));
    }

    let conn = db.conn.lock()?;
    let usuario = conn.query_row(
        "SELECT u.id, u.nombre, u.username, u.password_hash, u.password_salt, r.nombre, u.activo
         FROM usuarios u JOIN roles r ON r.id = u.rol_id
         WHERE u.username = ?1",
        rusqlite::params![username],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, bool>(6)?,
            ))
        },
    );

    let (id, nombre, username, hash, salt, rol, activo) = match usuario {
        Ok(u) => u,
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            warn!(username, "login with unknown user");
            return Err(AppError::validacion("El Usuario No Existe"));
        }
        Err(e) => return Err(e.into()),
    };

    if !activo {
        return Err(AppError::validacion("El Usuario esta inactivo"));
    }
    if utils::hash_password(&salt, password) != hash {
        warn!(usuario_id = id, "login with wrong password");
        return Err(AppError::validacion("El password es incorrecto"));
    }

    let rol = Rol::desde_nombre(&rol).ok_or(AppError::NoAutorizado)?;
    info!(usuario_id = id, rol = rol.nombre(), "session started");
    Ok(SesionActiva {
        usuario_id: id,
        nombre,
        username,
        rol,
        csrf: utils::generar_token(),
    })
}

pub fn listar_roles(db: &Database) -> Result<Vec<ItemCatalogo>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare("SELECT id, nombre FROM roles ORDER BY id")?;
    let roles = stmt
        .query_map([], |row| {
            Ok(ItemCatalogo {
                id: row.get(0)?,
                nombre: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(roles)
}

const SELECT_USUARIO: &str = "SELECT u.id, u.nombre, u.username, u.rol_id, r.nombre, u.activo
     FROM usuarios u JOIN roles r ON r.id = u.rol_id";

fn mapear_usuario(row: &rusqlite::Row) -> rusqlite::Result<UsuarioInfo> {
    Ok(UsuarioInfo {
        id: row.get(0)?,
        nombre: row.get(1)?,
        username: row.get(2)?,
        rol_id: row.get(3)?,
        rol: row.get(4)?,
        activo: row.get(5)?,
    })
}

pub fn listar_usuarios(db: &Database, sesion: &SesionActiva) -> Result<Vec<UsuarioInfo>, AppError> {
    verificar_supervisor(sesion)?;
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(&format!("{} ORDER BY u.nombre", SELECT_USUARIO))?;
    let usuarios = stmt
        .query_map([], mapear_usuario)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(usuarios)
}

pub fn obtener_usuario(
    db: &Database,
    sesion: &SesionActiva,
    id: i64,
) -> Result<UsuarioInfo, AppError> {
    verificar_supervisor(sesion)?;
    let conn = db.conn.lock()?;
    conn.query_row(
        &format!("{} WHERE u.id = ?1", SELECT_USUARIO),
        rusqlite::params![id],
        mapear_usuario,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NoEncontrado("Usuario no encontrado".into())
        }
        e => e.into(),
    })
}

fn validar_password(password: &str, errores: &mut Vec<String>) {
    if password.chars().count() < PASSWORD_MIN {
        errores.push(format!(
            "El Password debe ser de al menos {} caracteres",
            PASSWORD_MIN
        ));
    }
}

fn username_en_uso(
    conn: &rusqlite::Connection,
    username: &str,
    excepto: Option<i64>,
) -> Result<bool, AppError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM usuarios WHERE username = ?1 AND id != COALESCE(?2, -1)",
        rusqlite::params![username, excepto],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn crear_usuario(
    db: &Database,
    sesion: &SesionActiva,
    datos: &NuevoUsuario,
) -> Result<i64, AppError> {
    verificar_supervisor(sesion)?;

    let nombre = datos.nombre.trim().to_uppercase();
    let username = datos.username.trim();
    let mut errores = Vec::new();
    if nombre.is_empty() {
        errores.push("El Nombre es Obligatorio".to_string());
    }
    if username.is_empty() {
        errores.push("El Usuario es Obligatorio".to_string());
    }
    validar_password(&datos.password, &mut errores);
    if datos.password != datos.repetir_password {
        errores.push("Los Password no son iguales".to_string());
    }
    if datos.rol_id.is_none() {
        errores.push("El Rol es Obligatorio".to_string());
    }

    let conn = db.conn.lock()?;
    if !username.is_empty() && username_en_uso(&conn, username, None)? {
        errores.push("El Usuario ya esta registrado".to_string());
    }
    if !errores.is_empty() {
        return Err(AppError::Validacion(errores));
    }

    let ahora = db.ahora();
    let salt = utils::generar_salt();
    let hash = utils::hash_password(&salt, &datos.password);
    conn.execute(
        "INSERT INTO usuarios (nombre, username, password_hash, password_salt, rol_id, activo, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        rusqlite::params![nombre, username, hash, salt, datos.rol_id, ahora],
    )?;
    let id = conn.last_insert_rowid();
    info!(usuario_id = id, creado_por = sesion.usuario_id, "user created");
    Ok(id)
}

pub fn actualizar_usuario(
    db: &Database,
    sesion: &SesionActiva,
    id: i64,
    datos: &EdicionUsuario,
) -> Result<(), AppError> {
    verificar_supervisor(sesion)?;

    let nombre = datos.nombre.trim().to_uppercase();
    let username = datos.username.trim();
    let mut errores = Vec::new();
    if nombre.is_empty() {
        errores.push("El Nombre es Obligatorio".to_string());
    }
    if username.is_empty() {
        errores.push("El Usuario es Obligatorio".to_string());
    }
    if !datos.password.is_empty() {
        validar_password(&datos.password, &mut errores);
    }
    if datos.rol_id.is_none() {
        errores.push("El Rol es Obligatorio".to_string());
    }

    let mut conn = db.conn.lock()?;
    if !username.is_empty() && username_en_uso(&conn, username, Some(id))? {
        errores.push("El Usuario ya esta registrado".to_string());
    }
    if !errores.is_empty() {
        return Err(AppError::Validacion(errores));
    }

    let ahora = db.ahora();
    let tx = conn.transaction()?;
    let filas = tx.execute(
        "UPDATE usuarios SET nombre = ?1, username = ?2, rol_id = ?3, activo = ?4, updated_at = ?5
         WHERE id = ?6",
        rusqlite::params![nombre, username, datos.rol_id, datos.activo, ahora, id],
    )?;
    if filas == 0 {
        return Err(AppError::NoEncontrado("Usuario no encontrado".into()));
    }
    if !datos.password.is_empty() {
        let salt = utils::generar_salt();
        let hash = utils::hash_password(&salt, &datos.password);
        tx.execute(
            "UPDATE usuarios SET password_hash = ?1, password_salt = ?2 WHERE id = ?3",
            rusqlite::params![hash, salt, id],
        )?;
    }
    tx.commit()?;
    info!(usuario_id = id, "user updated");
    Ok(())
}

pub fn eliminar_usuario(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    verificar_supervisor(sesion)?;
    if id == sesion.usuario_id {
        return Err(AppError::Conflicto(
            "No puede eliminar su propio usuario".into(),
        ));
    }

    let conn = db.conn.lock()?;
    match conn.execute("DELETE FROM usuarios WHERE id = ?1", rusqlite::params![id]) {
        Ok(0) => Err(AppError::NoEncontrado("Usuario no encontrado".into())),
        Ok(_) => {
            info!(usuario_id = id, "user deleted");
            Ok(())
        }
        Err(e) if es_restriccion(&e) => Err(AppError::Conflicto(
            "El usuario tiene registros asociados; desactivelo en su lugar".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Cambio de password desde el perfil del propio usuario
pub fn cambiar_password(
    db: &Database,
    sesion: &SesionActiva,
    datos: &CambioPassword,
) -> Result<(), AppError> {
    let mut errores = Vec::new();
    if datos.password_actual.is_empty() {
        errores.push("El Password actual es Obligatorio".to_string());
    }
    validar_password(&datos.password_nuevo, &mut errores);
    if datos.password_nuevo != datos.repetir_password {
        errores.push("Los Password no son iguales".to_string());
    }
    if !errores.is_empty() {
        return Err(AppError::Validacion(errores));
    }

    let conn = db.conn.lock()?;
    let (hash, salt): (String, String) = conn.query_row(
        "SELECT password_hash, password_salt FROM usuarios WHERE id = ?1",
        rusqlite::params![sesion.usuario_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    if utils::hash_password(&salt, &datos.password_actual) != hash {
        return Err(AppError::validacion("El password actual es incorrecto"));
    }

    let salt = utils::generar_salt();
    let hash = utils::hash_password(&salt, &datos.password_nuevo);
    conn.execute(
        "UPDATE usuarios SET password_hash = ?1, password_salt = ?2, updated_at = ?3 WHERE id = ?4",
        rusqlite::params![hash, salt, db.ahora(), sesion.usuario_id],
    )?;
    info!(usuario_id = sesion.usuario_id, "password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pruebas;

    fn rol_id(db: &Database, nombre: &str) -> i64 {
        listar_roles(db)
            .unwrap()
            .into_iter()
            .find(|r| r.nombre == nombre)
            .unwrap()
            .id
    }

    fn nuevo(db: &Database, username: &str) -> NuevoUsuario {
        NuevoUsuario {
            nombre: "laura gomez".into(),
            username: username.into(),
            password: "secreto1".into(),
            repetir_password: "secreto1".into(),
            rol_id: Some(rol_id(db, "Empleado")),
        }
    }

    #[test]
    fn test_login_admin_por_defecto() {
        let db = Database::en_memoria().unwrap();
        let sesion = iniciar_sesion(&db, "admin", "admin123").unwrap();
        assert_eq!(sesion.rol, Rol::Admin);
        assert!(!sesion.csrf.is_empty());
    }

    #[test]
    fn test_login_errores() {
        let db = Database::en_memoria().unwrap();
        let err = iniciar_sesion(&db, "nadie", "x").unwrap_err();
        assert_eq!(err.to_string(), "El Usuario No Existe");
        let err = iniciar_sesion(&db, "admin", "malo").unwrap_err();
        assert_eq!(err.to_string(), "El password es incorrecto");
        assert!(matches!(
            iniciar_sesion(&db, "", ""),
            Err(AppError::Validacion(e)) if e.len() == 2
        ));
    }

    #[test]
    fn test_crear_usuario_y_login() {
        let db = Database::en_memoria().unwrap();
        let id = crear_usuario(&db, &pruebas::admin(), &nuevo(&db, "laura")).unwrap();
        let info = obtener_usuario(&db, &pruebas::admin(), id).unwrap();
        assert_eq!(info.nombre, "LAURA GOMEZ");
        let sesion = iniciar_sesion(&db, "laura", "secreto1").unwrap();
        assert_eq!(sesion.rol, Rol::Empleado);
    }

    #[test]
    fn test_crear_usuario_validaciones() {
        let db = Database::en_memoria().unwrap();
        let mut datos = nuevo(&db, "admin");
        datos.password = "123".into();
        let err = crear_usuario(&db, &pruebas::admin(), &datos).unwrap_err();
        match err {
            AppError::Validacion(errores) => {
                assert!(errores.iter().any(|e| e.contains("al menos 6")));
                assert!(errores.iter().any(|e| e.contains("no son iguales")));
                assert!(errores.iter().any(|e| e.contains("ya esta registrado")));
            }
            otro => panic!("error inesperado: {otro:?}"),
        }
    }

    #[test]
    fn test_empleado_no_administra_usuarios() {
        let db = Database::en_memoria().unwrap();
        let res = crear_usuario(&db, &pruebas::empleado(), &nuevo(&db, "x"));
        assert!(matches!(res, Err(AppError::NoAutorizado)));
    }

    #[test]
    fn test_actualizar_sin_password_conserva_el_anterior() {
        let db = Database::en_memoria().unwrap();
        let id = crear_usuario(&db, &pruebas::admin(), &nuevo(&db, "laura")).unwrap();
        let edicion = EdicionUsuario {
            nombre: "Laura G".into(),
            username: "laurag".into(),
            password: String::new(),
            rol_id: Some(rol_id(&db, "Supervisor")),
            activo: true,
        };
        actualizar_usuario(&db, &pruebas::admin(), id, &edicion).unwrap();
        let sesion = iniciar_sesion(&db, "laurag", "secreto1").unwrap();
        assert_eq!(sesion.rol, Rol::Supervisor);
    }

    #[test]
    fn test_no_elimina_su_propio_usuario() {
        let db = Database::en_memoria().unwrap();
        let res = eliminar_usuario(&db, &pruebas::admin(), 1);
        assert!(matches!(res, Err(AppError::Conflicto(_))));
    }

    #[test]
    fn test_cambiar_password() {
        let db = Database::en_memoria().unwrap();
        let datos = CambioPassword {
            password_actual: "admin123".into(),
            password_nuevo: "nuevo123".into(),
            repetir_password: "nuevo123".into(),
        };
        cambiar_password(&db, &pruebas::admin(), &datos).unwrap();
        assert!(iniciar_sesion(&db, "admin", "nuevo123").is_ok());

        let malo = CambioPassword {
            password_actual: "admin123".into(),
            ..datos
        };
        assert!(cambiar_password(&db, &pruebas::admin(), &malo).is_err());
    }
}
