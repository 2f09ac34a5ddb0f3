use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::NaiveDate;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Prefijos de celular colombiano aceptados
pub const PREFIJOS_CELULAR: [&str; 20] = [
    "300", "301", "302", "304", "305", "310", "311", "312", "313", "314", "315", "316", "317",
    "318", "319", "320", "321", "322", "323", "324",
];
const PREFIJOS_CELULAR_EXTRA: [&str; 2] = ["350", "351"];

/// Genera un salt aleatorio de 16 caracteres hexadecimales
pub fn generar_salt() -> String {
    let mut rng = rand::thread_rng();
    let salt: u64 = rng.gen();
    format!("{:016x}", salt)
}

/// Hash de password con salt usando SHA-256, en hexadecimal
pub fn hash_password(salt: &str, password: &str) -> String {
    let input = format!("{}{}", salt, password);
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}

/// Token aleatorio para cookies de sesion y CSRF
pub fn generar_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Formato de pesos colombianos: `$ 1.234.567` (centavos solo si existen)
pub fn formatear_moneda(valor: f64) -> String {
    let negativo = valor < 0.0;
    let centavos_totales = (valor.abs() * 100.0).round() as i64;
    let enteros = centavos_totales / 100;
    let centavos = centavos_totales % 100;

    let digitos = enteros.to_string();
    let mut agrupado = String::new();
    for (i, c) in digitos.chars().enumerate() {
        if i > 0 && (digitos.len() - i) % 3 == 0 {
            agrupado.push('.');
        }
        agrupado.push(c);
    }

    let signo = if negativo && centavos_totales > 0 { "-" } else { "" };
    if centavos > 0 {
        format!("{}$ {},{:02}", signo, agrupado, centavos)
    } else {
        format!("{}$ {}", signo, agrupado)
    }
}

/// Cantidades de inventario: sin decimales si es entera
pub fn formatear_cantidad(cant: f64) -> String {
    if cant == cant.floor() {
        format!("{:.0}", cant)
    } else {
        format!("{:.3}", cant)
            .trim_end_matches('0')
            .to_string()
    }
}

pub fn email_valido(email: &str) -> bool {
    let email = email.trim();
    let Some((usuario, dominio)) = email.split_once('@') else {
        return false;
    };
    !usuario.is_empty()
        && !dominio.starts_with('.')
        && !dominio.ends_with('.')
        && dominio.contains('.')
        && !email.contains(char::is_whitespace)
        && !dominio.contains('@')
}

/// Telefono = prefijo de celular valido + 7 digitos
pub fn telefono_valido(prefijo: &str, numero: &str) -> bool {
    let prefijo_ok =
        PREFIJOS_CELULAR.contains(&prefijo) || PREFIJOS_CELULAR_EXTRA.contains(&prefijo);
    prefijo_ok && numero.len() == 7 && numero.chars().all(|c| c.is_ascii_digit())
}

pub fn prefijos_celular() -> Vec<&'static str> {
    PREFIJOS_CELULAR
        .iter()
        .chain(PREFIJOS_CELULAR_EXTRA.iter())
        .copied()
        .collect()
}

/// Fecha ISO `YYYY-MM-DD`
pub fn parse_fecha(valor: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(valor.trim(), "%Y-%m-%d").ok()
}

/// Numero decimal finito; rechaza `inf` y `NaN`
pub fn parse_numero(valor: &str) -> Option<f64> {
    valor.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Devuelve `None` para cadenas vacias o de solo espacios
pub fn limpiar(valor: Option<&str>) -> Option<String> {
    valor
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Numero de paginas para `total` filas con `por_pagina` filas cada una (minimo 1)
pub fn total_paginas(total: i64, por_pagina: i64) -> i64 {
    if total <= 0 {
        1
    } else {
        (total + por_pagina - 1) / por_pagina
    }
}

/// Normaliza la pagina pedida a 1..=paginas y devuelve (pagina, offset)
pub fn paginar(pagina: i64, total: i64, por_pagina: i64) -> (i64, i64) {
    let paginas = total_paginas(total, por_pagina);
    let pagina = pagina.clamp(1, paginas);
    (pagina, (pagina - 1) * por_pagina)
}

/// Compara montos con tolerancia de un centavo
pub fn montos_iguales(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.01
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_determinista() {
        let h1 = hash_password("abc", "secreto");
        let h2 = hash_password("abc", "secreto");
        assert_eq!(h1, h2);
        assert_ne!(h1, hash_password("abd", "secreto"));
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_generar_salt_longitud() {
        assert_eq!(generar_salt().len(), 16);
    }

    #[test]
    fn test_tokens_distintos() {
        assert_ne!(generar_token(), generar_token());
    }

    #[test]
    fn test_formatear_moneda() {
        assert_eq!(formatear_moneda(0.0), "$ 0");
        assert_eq!(formatear_moneda(45000.0), "$ 45.000");
        assert_eq!(formatear_moneda(1234567.0), "$ 1.234.567");
        assert_eq!(formatear_moneda(-2500.5), "-$ 2.500,50");
    }

    #[test]
    fn test_formatear_cantidad() {
        assert_eq!(formatear_cantidad(3.0), "3");
        assert_eq!(formatear_cantidad(0.25), "0.25");
    }

    #[test]
    fn test_email_valido() {
        assert!(email_valido("ana@correo.com"));
        assert!(!email_valido("ana@correo"));
        assert!(!email_valido("@correo.com"));
        assert!(!email_valido("ana correo.com"));
    }

    #[test]
    fn test_telefono_valido() {
        assert!(telefono_valido("310", "1234567"));
        assert!(telefono_valido("351", "7654321"));
        assert!(!telefono_valido("303", "1234567"));
        assert!(!telefono_valido("310", "123456"));
        assert!(!telefono_valido("310", "12345a7"));
    }

    #[test]
    fn test_paginar() {
        assert_eq!(total_paginas(0, 10), 1);
        assert_eq!(total_paginas(21, 10), 3);
        assert_eq!(paginar(5, 21, 10), (3, 20));
        assert_eq!(paginar(0, 21, 10), (1, 0));
    }
}
