//! Homogeneous one-dimensional arrays

use super::{Complex, DType, Scalar, Value};
use crate::error::ValueError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Array {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Complex(Vec<Complex>),
    Str(Vec<String>),
}

impl Array {
    pub fn len(&self) -> usize {
        match self {
            Array::Bool(v) => v.len(),
            Array::Int(v) => v.len(),
            Array::Float(v) => v.len(),
            Array::Complex(v) => v.len(),
            Array::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            Array::Bool(_) => DType::Bool,
            Array::Int(_) => DType::Int,
            Array::Float(_) => DType::Float,
            Array::Complex(_) => DType::Complex,
            Array::Str(_) => DType::Str,
        }
    }

    pub fn empty(dtype: DType) -> Array {
        match dtype {
            DType::Bool => Array::Bool(Vec::new()),
            DType::Int => Array::Int(Vec::new()),
            DType::Float => Array::Float(Vec::new()),
            DType::Complex => Array::Complex(Vec::new()),
            DType::Str => Array::Str(Vec::new()),
        }
    }

    /// Array of `len` copies of `fill`, converted to `dtype`
    pub fn full(dtype: DType, len: usize, fill: &Scalar) -> Result<Array, ValueError> {
        Ok(match fill.coerce(dtype)? {
            Scalar::Bool(b) => Array::Bool(vec![b; len]),
            Scalar::Int(i) => Array::Int(vec![i; len]),
            Scalar::Float(x) => Array::Float(vec![x; len]),
            Scalar::Complex(c) => Array::Complex(vec![c; len]),
            Scalar::Str(s) => Array::Str(vec![s; len]),
        })
    }

    pub fn get(&self, index: usize) -> Option<Scalar> {
        match self {
            Array::Bool(v) => v.get(index).map(|b| Scalar::Bool(*b)),
            Array::Int(v) => v.get(index).map(|i| Scalar::Int(*i)),
            Array::Float(v) => v.get(index).map(|x| Scalar::Float(*x)),
            Array::Complex(v) => v.get(index).map(|c| Scalar::Complex(*c)),
            Array::Str(v) => v.get(index).map(|s| Scalar::Str(s.clone())),
        }
    }

    pub fn scalars(&self) -> impl Iterator<Item = Scalar> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Build an array from scalars; the dtype is inferred by promotion unless given
    pub fn from_scalars(dtype: Option<DType>, items: Vec<Scalar>) -> Result<Array, ValueError> {
        let dtype = match dtype {
            Some(d) => d,
            None => {
                let mut inferred: Option<DType> = None;
                for item in &items {
                    inferred = Some(match inferred {
                        None => item.dtype(),
                        Some(d) => d.promote(item.dtype()).ok_or_else(|| {
                            ValueError::Type(format!(
                                "cannot mix {} and {} in one array",
                                d,
                                item.dtype()
                            ))
                        })?,
                    });
                }
                inferred.unwrap_or(DType::Float)
            }
        };
        let mut out = Array::empty(dtype);
        for item in items {
            out.push(item.coerce(dtype)?);
        }
        Ok(out)
    }

    /// Materialize an array from an array, a sequence of scalars, or a scalar
    pub fn from_value(value: &Value) -> Result<Array, ValueError> {
        match value {
            Value::Array(a) => Ok(a.as_ref().clone()),
            Value::Scalar(s) => Array::from_scalars(None, vec![s.clone()]),
            Value::Sequence(items) => {
                let mut scalars = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Scalar(s) => scalars.push(s.clone()),
                        other => {
                            return Err(ValueError::Type(format!(
                                "array elements must be scalars, got {}",
                                other.kind()
                            )))
                        }
                    }
                }
                Array::from_scalars(None, scalars)
            }
            other => Err(ValueError::Type(format!(
                "cannot build an array from a {}",
                other.kind()
            ))),
        }
    }

    fn push(&mut self, item: Scalar) {
        match (self, item) {
            (Array::Bool(v), Scalar::Bool(b)) => v.push(b),
            (Array::Int(v), Scalar::Int(i)) => v.push(i),
            (Array::Float(v), Scalar::Float(x)) => v.push(x),
            (Array::Complex(v), Scalar::Complex(c)) => v.push(c),
            (Array::Str(v), Scalar::Str(s)) => v.push(s),
            // callers coerce before pushing
            _ => {}
        }
    }

    fn put(&mut self, index: usize, item: Scalar) {
        match (self, item) {
            (Array::Bool(v), Scalar::Bool(b)) => v[index] = b,
            (Array::Int(v), Scalar::Int(i)) => v[index] = i,
            (Array::Float(v), Scalar::Float(x)) => v[index] = x,
            (Array::Complex(v), Scalar::Complex(c)) => v[index] = c,
            (Array::Str(v), Scalar::Str(s)) => v[index] = s,
            _ => {}
        }
    }

    /// Elements at `indices`, in that order
    pub fn gather(&self, indices: &[usize]) -> Array {
        match self {
            Array::Bool(v) => Array::Bool(indices.iter().map(|&i| v[i]).collect()),
            Array::Int(v) => Array::Int(indices.iter().map(|&i| v[i]).collect()),
            Array::Float(v) => Array::Float(indices.iter().map(|&i| v[i]).collect()),
            Array::Complex(v) => Array::Complex(indices.iter().map(|&i| v[i]).collect()),
            Array::Str(v) => Array::Str(indices.iter().map(|&i| v[i].clone()).collect()),
        }
    }

    /// Write `values[k]` to position `indices[k]`, converting to this array's dtype
    pub fn scatter(&mut self, indices: &[usize], values: &Array) -> Result<(), ValueError> {
        if indices.len() != values.len() {
            return Err(ValueError::Shape {
                left: indices.len(),
                right: values.len(),
            });
        }
        let dtype = self.dtype();
        let converted: Vec<Scalar> = values
            .scalars()
            .map(|s| s.coerce(dtype))
            .collect::<Result<_, _>>()?;
        for (&index, item) in indices.iter().zip(converted) {
            self.put(index, item);
        }
        Ok(())
    }

    /// Write `value` at every position in `indices`
    pub fn fill_at(&mut self, indices: &[usize], value: &Scalar) -> Result<(), ValueError> {
        let item = value.coerce(self.dtype())?;
        for &index in indices {
            self.put(index, item.clone());
        }
        Ok(())
    }

    /// Copy truncated or padded with `fill` to `len` elements
    pub fn resized(&self, len: usize, fill: &Scalar) -> Result<Array, ValueError> {
        let mut out = self.clone();
        let current = out.len();
        if len <= current {
            let keep: Vec<usize> = (0..len).collect();
            return Ok(out.gather(&keep));
        }
        let fill = fill.coerce(out.dtype())?;
        for _ in current..len {
            out.push(fill.clone());
        }
        Ok(out)
    }

    /// Lossless conversion to `dtype`
    pub fn cast(&self, dtype: DType) -> Result<Array, ValueError> {
        if self.dtype() == dtype {
            return Ok(self.clone());
        }
        Array::from_scalars(Some(dtype), self.scalars().collect())
    }

    /// Real-valued view (bool, int, float)
    pub fn to_f64(&self) -> Result<Vec<f64>, ValueError> {
        match self {
            Array::Bool(v) => Ok(v.iter().map(|b| if *b { 1.0 } else { 0.0 }).collect()),
            Array::Int(v) => Ok(v.iter().map(|i| *i as f64).collect()),
            Array::Float(v) => Ok(v.clone()),
            other => Err(ValueError::Type(format!(
                "expected a real-valued array, got {}",
                other.dtype()
            ))),
        }
    }

    /// Truthiness of every element
    pub fn to_mask(&self) -> Vec<bool> {
        match self {
            Array::Bool(v) => v.clone(),
            _ => self.scalars().map(|s| s.is_truthy()).collect(),
        }
    }

    /// Element-wise finiteness; non-float dtypes are always finite
    pub fn is_finite(&self) -> Vec<bool> {
        match self {
            Array::Float(v) => v.iter().map(|x| x.is_finite()).collect(),
            Array::Complex(v) => v
                .iter()
                .map(|c| c.re.is_finite() && c.im.is_finite())
                .collect(),
            other => vec![true; other.len()],
        }
    }

    pub fn as_bool(&self) -> Option<&[bool]> {
        match self {
            Array::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&[i64]> {
        match self {
            Array::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            Array::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&[String]> {
        match self {
            Array::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl Array {
    /// Stable ordering permutation; NaN sorts last in either direction
    pub fn argsort(&self, descending: bool) -> Result<Vec<usize>, ValueError> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        match self {
            Array::Str(v) => sort_ordered(v, &mut order, descending),
            Array::Int(v) => sort_ordered(v, &mut order, descending),
            Array::Complex(_) => {
                return Err(ValueError::Type("complex values cannot be ordered".to_string()))
            }
            _ => {
                let keys = self.to_f64()?;
                order.sort_by(|&a, &b| order_keys(keys[a], keys[b], descending));
            }
        }
        Ok(order)
    }
}

fn sort_ordered<T: Ord>(keys: &[T], order: &mut [usize], descending: bool) {
    if descending {
        order.sort_by(|&a, &b| keys[b].cmp(&keys[a]));
    } else {
        order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    }
}

fn order_keys(a: f64, b: f64, descending: bool) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => {
            let ordering = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, item) in self.scalars().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", item)?;
        }
        f.write_str("]")
    }
}

/// Positions where `mask` is true
pub fn mask_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &m)| if m { Some(i) } else { None })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argsort_compares_large_integers_exactly() {
        let base = 1i64 << 60;
        let arr = Array::Int(vec![base + 3, base + 1, base + 2, base + 1]);
        assert_eq!(arr.argsort(false).unwrap(), vec![1, 3, 2, 0]);
        assert_eq!(arr.argsort(true).unwrap(), vec![0, 2, 1, 3]);
    }

    #[test]
    fn argsort_is_stable_with_nan_last() {
        let arr = Array::Float(vec![2.0, f64::NAN, 1.0, 2.0]);
        assert_eq!(arr.argsort(false).unwrap(), vec![2, 0, 3, 1]);
        assert_eq!(arr.argsort(true).unwrap(), vec![0, 3, 2, 1]);
        let words = Array::Str(vec!["b".into(), "a".into()]);
        assert_eq!(words.argsort(false).unwrap(), vec![1, 0]);
    }

    #[test]
    fn from_scalars_infers_widest_dtype() {
        let arr = Array::from_scalars(None, vec![Scalar::Int(1), Scalar::Float(2.5)]).unwrap();
        assert_eq!(arr, Array::Float(vec![1.0, 2.5]));

        let err = Array::from_scalars(None, vec![Scalar::Int(1), Scalar::Str("a".into())]);
        assert!(err.is_err());
    }

    #[test]
    fn gather_and_scatter() {
        let mut arr = Array::Int(vec![1, 2, 3, 4]);
        assert_eq!(arr.gather(&[3, 0]), Array::Int(vec![4, 1]));

        arr.scatter(&[1, 2], &Array::Float(vec![7.0, 8.0])).unwrap();
        assert_eq!(arr, Array::Int(vec![1, 7, 8, 4]));

        let err = arr.scatter(&[0], &Array::Float(vec![0.5]));
        assert!(matches!(err, Err(ValueError::Narrowing { .. })));
    }

    #[test]
    fn resized_pads_with_fill() {
        let arr = Array::Float(vec![1.0, 2.0]);
        let grown = arr.resized(4, &Scalar::Float(f64::NAN)).unwrap();
        assert_eq!(grown.len(), 4);
        assert!(grown.as_float().unwrap()[3].is_nan());
        assert_eq!(arr.resized(1, &Scalar::Float(0.0)).unwrap(), Array::Float(vec![1.0]));
    }

    #[test]
    fn finiteness_ignores_non_float() {
        let arr = Array::Float(vec![1.0, f64::NAN, f64::INFINITY]);
        assert_eq!(arr.is_finite(), vec![true, false, false]);
        assert_eq!(Array::Int(vec![1, 2]).is_finite(), vec![true, true]);
    }

    #[test]
    fn mask_indices_lists_true_positions() {
        assert_eq!(mask_indices(&[false, true, true, false]), vec![1, 2]);
    }
}
