//! Address fields

use serde::{Deserialize, Serialize};

/// Free-text locality columns of a `direccion` row.
///
/// Every column is optional. Widths are enforced by the table definition,
/// not here, so an over-long value fails inside the transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFields {
    #[serde(rename = "Manzana", default)]
    pub manzana: Option<String>,
    #[serde(rename = "Lote", default)]
    pub lote: Option<String>,
    #[serde(rename = "Distrito", default)]
    pub distrito: Option<String>,
    #[serde(rename = "Provincia", default)]
    pub provincia: Option<String>,
    #[serde(rename = "Calle", default)]
    pub calle: Option<String>,
    #[serde(rename = "Referencia", default)]
    pub referencia: Option<String>,
}

impl AddressFields {
    /// True when no column carries a non-blank value.
    pub fn is_empty(&self) -> bool {
        self.columns()
            .iter()
            .all(|(_, value, _)| value.map_or(true, |v| v.trim().is_empty()))
    }

    /// Copy with blank strings turned into NULLs.
    pub fn normalized(&self) -> Self {
        fn clean(v: &Option<String>) -> Option<String> {
            v.as_ref().filter(|s| !s.trim().is_empty()).cloned()
        }

        Self {
            manzana: clean(&self.manzana),
            lote: clean(&self.lote),
            distrito: clean(&self.distrito),
            provincia: clean(&self.provincia),
            calle: clean(&self.calle),
            referencia: clean(&self.referencia),
        }
    }

    /// Write the present columns onto `base`, leaving the rest untouched.
    pub fn overlay(&self, base: &mut AddressFields) {
        fn set(target: &mut Option<String>, value: &Option<String>) {
            if value.is_some() {
                target.clone_from(value);
            }
        }

        set(&mut base.manzana, &self.manzana);
        set(&mut base.lote, &self.lote);
        set(&mut base.distrito, &self.distrito);
        set(&mut base.provincia, &self.provincia);
        set(&mut base.calle, &self.calle);
        set(&mut base.referencia, &self.referencia);
    }

    /// `(column, value, width)` for every column, in table order.
    pub fn columns(&self) -> [(&'static str, Option<&str>, usize); 6] {
        [
            ("manzana", self.manzana.as_deref(), 20),
            ("lote", self.lote.as_deref(), 20),
            ("distrito", self.distrito.as_deref(), 100),
            ("provincia", self.provincia.as_deref(), 100),
            ("calle", self.calle.as_deref(), 200),
            ("referencia", self.referencia.as_deref(), 200),
        ]
    }
}
