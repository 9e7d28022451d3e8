use super::{Filter, FilterCore, FilterModified, FilterResult};
use crate::block::Expression;
use crate::context::Context;
use crate::error::FilterError;
use crate::event::Channel;
use parking_lot::RwLock;
use std::collections::BTreeSet;

/// Closed polygon ring as `(x, y)` vertices; the closing edge is implicit
pub type Ring = Vec<(f64, f64)>;

struct Params {
    rings: Vec<Ring>,
    x_value: Expression,
    y_value: Expression,
}

/// Samples whose `(x_value, y_value)` falls inside any ring
pub struct PolygonFilter {
    core: FilterCore,
    params: RwLock<Params>,
}

impl PolygonFilter {
    pub fn new(rings: Vec<Ring>, x_value: &str, y_value: &str) -> Result<Self, FilterError> {
        Ok(Self {
            core: FilterCore::default(),
            params: RwLock::new(Params {
                rings,
                x_value: Expression::parse(x_value)?,
                y_value: Expression::parse(y_value)?,
            }),
        })
    }

    pub fn rings(&self) -> Vec<Ring> {
        self.params.read().rings.clone()
    }

    pub fn set_rings(&self, rings: Vec<Ring>) {
        self.params.write().rings = rings;
        self.core.notify("points");
    }

    pub fn set_x_value(&self, source: &str) -> Result<(), FilterError> {
        let expression = Expression::parse(source)?;
        self.params.write().x_value = expression;
        self.core.notify("x_value");
        Ok(())
    }

    pub fn set_y_value(&self, source: &str) -> Result<(), FilterError> {
        let expression = Expression::parse(source)?;
        self.params.write().y_value = expression;
        self.core.notify("y_value");
        Ok(())
    }
}

/// Even-odd crossing test; a point on a lower edge is outside, on an upper edge inside
pub fn ring_contains(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi >= y) != (yj >= y) {
            let crossing = xi + (y - yi) * (xj - xi) / (yj - yi);
            if x < crossing {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

impl Filter for PolygonFilter {
    fn kind(&self) -> &'static str {
        "polygon"
    }

    fn evaluate(&self, context: &dyn Context) -> Result<Option<FilterResult>, FilterError> {
        let params = self.params.read();
        if params.rings.is_empty() {
            return Ok(None);
        }
        let xs = params.x_value.evaluate(context)?.to_array()?.to_f64()?;
        let ys = params.y_value.evaluate(context)?.to_array()?.to_f64()?;
        let len = context.len();
        if xs.len() != len || ys.len() != len {
            return Err(FilterError::Evaluation(format!(
                "polygon coordinates have {} and {} elements, context has {}",
                xs.len(),
                ys.len(),
                len
            )));
        }
        let mask = xs
            .iter()
            .zip(&ys)
            .map(|(&x, &y)| params.rings.iter().any(|ring| ring_contains(ring, x, y)))
            .collect();
        Ok(Some(FilterResult::Mask(mask)))
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.core.set_enabled(enabled)
    }

    fn context_changed(&self, _context: &dyn Context, names: &BTreeSet<String>) -> bool {
        let params = self.params.read();
        params
            .x_value
            .inputs()
            .union(&params.y_value.inputs())
            .any(|name| names.contains(name))
    }

    fn modified(&self) -> &Channel<FilterModified> {
        self.core.modified()
    }
}
