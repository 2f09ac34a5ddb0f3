use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use damaris_spa::config::Config;
use damaris_spa::db::Database;
use damaris_spa::{crear_app, AppState};

fn app() -> Router {
    let db = Database::en_memoria().unwrap();
    crear_app(AppState::new(db, Config::para_pruebas()))
}

async fn enviar(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn texto(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::get(uri);
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::empty()).unwrap()
}

fn post(uri: &str, cookie: Option<&str>, form: &str) -> Request<Body> {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::from(form.to_string())).unwrap()
}

fn location(resp: &Response) -> &str {
    resp.headers()[header::LOCATION].to_str().unwrap()
}

/// Inicia sesion como admin y devuelve (cookie, csrf)
async fn login_admin(app: &Router) -> (String, String) {
    let resp = enviar(app, post("/auth/login", None, "username=admin&password=admin123")).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let html = texto(enviar(app, get("/perfil", Some(&cookie))).await).await;
    let marca = "name=\"_csrf\" value=\"";
    let inicio = html.find(marca).unwrap() + marca.len();
    let fin = inicio + html[inicio..].find('"').unwrap();
    (cookie, html[inicio..fin].to_string())
}

#[tokio::test]
async fn test_pagina_de_login() {
    let app = app();
    let resp = enviar(&app, get("/auth/login", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(texto(resp).await.contains("name=\"username\""));
}

#[tokio::test]
async fn test_sin_sesion_redirige_al_login() {
    let app = app();
    let resp = enviar(&app, get("/mis-actividades", None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login");

    let resp = enviar(&app, get("/dashboard", Some("_token=inventado"))).await;
    assert_eq!(location(&resp), "/auth/login");
}

#[tokio::test]
async fn test_login_con_password_incorrecto() {
    let app = app();
    let resp = enviar(&app, post("/auth/login", None, "username=admin&password=otra")).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(texto(resp).await.contains("El password es incorrecto"));

    let resp = enviar(&app, post("/auth/login", None, "username=nadie&password=x")).await;
    assert!(texto(resp).await.contains("El Usuario No Existe"));
}

#[tokio::test]
async fn test_login_crea_cookie_y_redirige() {
    let app = app();
    let resp = enviar(&app, post("/auth/login", None, "username=admin&password=admin123")).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/mis-actividades");
    let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("_token="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_post_sin_csrf_es_rechazado() {
    let app = app();
    let (cookie, _) = login_admin(&app).await;
    let form = "nombre=Ana&apellidos=Perez&cedula=1010&prefijo=300&telefono=1234567&tipo=Spa";
    let resp = enviar(&app, post("/clientes/nuevo", Some(&cookie), form)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let con_token_falso = format!("{}&_csrf=falso", form);
    let resp = enviar(&app, post("/clientes/nuevo", Some(&cookie), &con_token_falso)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_crear_cliente_y_listarlo() {
    let app = app();
    let (cookie, csrf) = login_admin(&app).await;
    let form = format!(
        "_csrf={}&nombre=Ana&apellidos=Perez&cedula=1010&prefijo=300&telefono=1234567&tipo=Spa",
        csrf
    );
    let resp = enviar(&app, post("/clientes/nuevo", Some(&cookie), &form)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/clientes?msg=creado");

    let html = texto(enviar(&app, get("/clientes?busqueda=ana", Some(&cookie))).await).await;
    assert!(html.contains("PEREZ"));

    let repetido = enviar(&app, post("/clientes/nuevo", Some(&cookie), &form)).await;
    assert_eq!(repetido.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(texto(repetido).await.contains("La Cedula ya esta registrada"));
}

#[tokio::test]
async fn test_cierre_sin_movimientos() {
    let app = app();
    let (cookie, _) = login_admin(&app).await;
    let resp = enviar(&app, get("/caja/cierre", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/mis-actividades?msg=sin_movimientos");
}

#[tokio::test]
async fn test_buscar_articulos_vacio() {
    let app = app();
    let (cookie, _) = login_admin(&app).await;
    let resp = enviar(&app, get("/api/articulos/buscar?termino=", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(texto(resp).await, "[]");
}

#[tokio::test]
async fn test_verificar_factura_inexistente() {
    let app = app();
    let (cookie, _) = login_admin(&app).await;
    let resp = enviar(&app, get("/facturas/verificar/no-existe", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&texto(resp).await).unwrap();
    assert_eq!(json["existe"], false);
    assert_eq!(json["actividadId"], "no-existe");

    let resp = enviar(&app, get("/facturas/reimprimir/no-existe", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_paginas_principales_como_admin() {
    let app = app();
    let (cookie, _) = login_admin(&app).await;
    for uri in [
        "/dashboard",
        "/mis-actividades",
        "/actividades/nueva",
        "/actividades/pagos",
        "/caja/historial",
        "/inventario/articulos",
        "/gastos",
        "/gastos-administrativos/nuevo",
        "/ropa/ventas",
        "/reportes/ganancias",
        "/reportes/personal",
        "/reportes/clientes-frecuentes",
        "/admin/usuarios",
        "/admin/auditoria",
    ] {
        let resp = enviar(&app, get(uri, Some(&cookie))).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn test_logout_cierra_la_sesion() {
    let app = app();
    let (cookie, csrf) = login_admin(&app).await;
    let resp = enviar(&app, post("/auth/logout", Some(&cookie), &format!("_csrf={}", csrf))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login?msg=sesion_cerrada");

    let resp = enviar(&app, get("/dashboard", Some(&cookie))).await;
    assert_eq!(location(&resp), "/auth/login");
}

#[tokio::test]
async fn test_eliminar_articulo_de_inventario() {
    let app = app();
    let (cookie, csrf) = login_admin(&app).await;

    let resp = enviar(&app, post("/inventario/articulos/999/eliminar", Some(&cookie), "")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let form = format!("_csrf={}", csrf);
    let resp = enviar(&app, post("/inventario/articulos/999/eliminar", Some(&cookie), &form)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
