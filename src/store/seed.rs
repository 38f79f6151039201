//! Static catalog data: product categories and the sample products loaded
//! into an empty database.

use super::{NewProduct, Store};
use anyhow::Result;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category {
        id: "aeronaves",
        name: "Aeronaves",
        description: "Aviões, helicópteros e aeronaves militares",
    },
    Category {
        id: "terrestres",
        name: "Terrestres",
        description: "Tanques, veículos militares e terrestres",
    },
    Category {
        id: "navais",
        name: "Navais",
        description: "Navios, submarinos e embarcações",
    },
    Category {
        id: "ficção",
        name: "Ficção Científica",
        description: "Naves espaciais e veículos de ficção",
    },
    Category {
        id: "automotivos",
        name: "Automotivos",
        description: "Carros esportivos e veículos civis",
    },
];

#[must_use]
pub fn is_known_category(id: &str) -> bool {
    CATEGORIES.iter().any(|category| category.id == id)
}

pub struct SampleProduct {
    pub name: &'static str,
    pub description: &'static str,
    pub price: f64,
    pub category: &'static str,
    pub is_featured: bool,
    pub stock_quantity: i64,
}

pub const SAMPLE_PRODUCTS: &[SampleProduct] = &[
    SampleProduct {
        name: "Apache AH-64 Helicopter",
        description: "Modelo detalhado do helicóptero de combate Apache AH-64. Perfeito para colecionadores e entusiastas de aviação militar.",
        price: 89.90,
        category: "aeronaves",
        is_featured: true,
        stock_quantity: 10,
    },
    SampleProduct {
        name: "F-22 Raptor Fighter Jet",
        description: "Caça stealth F-22 Raptor em escala detalhada. Inclui detalhes internos e externos precisos.",
        price: 129.90,
        category: "aeronaves",
        is_featured: true,
        stock_quantity: 8,
    },
    SampleProduct {
        name: "M1A2 Abrams Tank",
        description: "Tanque de guerra americano M1A2 Abrams com detalhes realistas e alta qualidade de impressão.",
        price: 149.90,
        category: "terrestres",
        is_featured: true,
        stock_quantity: 5,
    },
    SampleProduct {
        name: "USS Enterprise Aircraft Carrier",
        description: "Porta-aviões nuclear USS Enterprise em escala reduzida com detalhes impressionantes.",
        price: 299.90,
        category: "navais",
        is_featured: true,
        stock_quantity: 3,
    },
    SampleProduct {
        name: "Millennium Falcon",
        description: "Nave espacial icônica de Star Wars com todos os detalhes externos e internos.",
        price: 199.90,
        category: "ficção",
        is_featured: false,
        stock_quantity: 7,
    },
    SampleProduct {
        name: "Lamborghini Aventador",
        description: "Superesportivo italiano em escala perfeita com detalhes automotivos precisos.",
        price: 179.90,
        category: "automotivos",
        is_featured: false,
        stock_quantity: 6,
    },
];

impl SampleProduct {
    fn to_new_product(&self) -> NewProduct {
        NewProduct {
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            price: self.price,
            category: self.category.to_string(),
            image_url: None,
            is_featured: self.is_featured,
            stock_quantity: self.stock_quantity,
        }
    }
}

/// Insert the sample products when the catalog is empty. Returns how many were added.
///
/// # Errors
/// Returns an error if counting or inserting fails.
pub async fn seed_catalog(store: &dyn Store) -> Result<usize> {
    if store.count_products().await? > 0 {
        return Ok(0);
    }

    for sample in SAMPLE_PRODUCTS {
        store.create_product(&sample.to_new_product()).await?;
    }

    Ok(SAMPLE_PRODUCTS.len())
}
