//! In-memory row store used by the unit tests

use crate::backend::{Array, ArrayError, BinaryOp, DType, Operand, Scalar, Structure};
use regex::Regex;

/// A column of scalars tagged with row identities
#[derive(Debug, Clone, PartialEq)]
pub struct RowArray {
    pub values: Vec<Scalar>,
    pub index: Vec<usize>,
}

impl RowArray {
    pub fn new(values: Vec<Scalar>, index: Vec<usize>) -> Self {
        Self { values, index }
    }

    /// Boolean view, for assertions
    pub fn bools(&self) -> Vec<bool> {
        self.values.iter().map(Scalar::truthy).collect()
    }

    fn map(&self, f: impl Fn(&Scalar) -> Result<Scalar, ArrayError>) -> Result<Self, ArrayError> {
        let values = self.values.iter().map(f).collect::<Result<_, _>>()?;
        Ok(Self::new(values, self.index.clone()))
    }
}

impl Array for RowArray {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn row_index(&self) -> Vec<usize> {
        self.index.clone()
    }

    fn binary(&self, op: BinaryOp, rhs: Operand<'_, Self>) -> Result<Self, ArrayError> {
        match rhs {
            Operand::Scalar(s) => self.map(|v| v.binary(op, s)),
            Operand::Array(other) => {
                if other.len() != self.len() {
                    return Err(ArrayError::LengthMismatch {
                        left: self.len(),
                        right: other.len(),
                    });
                }
                let values = self
                    .values
                    .iter()
                    .zip(&other.values)
                    .map(|(a, b)| a.binary(op, b))
                    .collect::<Result<_, _>>()?;
                Ok(Self::new(values, self.index.clone()))
            }
        }
    }

    fn neg(&self) -> Result<Self, ArrayError> {
        self.map(Scalar::neg)
    }

    fn invert(&self) -> Result<Self, ArrayError> {
        self.map(|v| Ok(Scalar::Bool(!v.truthy())))
    }

    fn astype(&self, dtype: DType) -> Result<Self, ArrayError> {
        self.map(|v| v.cast(dtype))
    }

    fn map_float(&self, f: fn(f64) -> f64) -> Result<Self, ArrayError> {
        self.map(|v| {
            v.as_f64()
                .map(|x| Scalar::Float(f(x)))
                .ok_or(ArrayError::TypeMismatch {
                    op: "map_float",
                    lhs: v.type_name(),
                    rhs: "float",
                })
        })
    }

    fn any(&self) -> bool {
        self.values.iter().any(Scalar::truthy)
    }

    fn all(&self) -> bool {
        self.values.iter().all(Scalar::truthy)
    }

    fn isin(&self, values: &[Scalar]) -> Self {
        let mask = self
            .values
            .iter()
            .map(|v| {
                Scalar::Bool(values.iter().any(|candidate| {
                    v.binary(BinaryOp::Eq, candidate)
                        .map(|eq| eq.truthy())
                        .unwrap_or(false)
                }))
            })
            .collect();
        Self::new(mask, self.index.clone())
    }

    fn unique(&self) -> Vec<Scalar> {
        let mut out: Vec<Scalar> = Vec::new();
        for v in &self.values {
            if !out.contains(v) {
                out.push(v.clone());
            }
        }
        out
    }

    fn values(&self) -> Vec<Scalar> {
        self.values.clone()
    }

    fn set_by_index(&self, values: &Self) -> Result<Self, ArrayError> {
        let mut out = self.clone();
        for (row, value) in values.index.iter().zip(&values.values) {
            let pos = self
                .index
                .iter()
                .position(|i| i == row)
                .ok_or(ArrayError::UnknownIndex(*row))?;
            out.values[pos] = value.clone();
        }
        Ok(out)
    }

    fn str_contains(&self, pattern: &Regex) -> Option<Self> {
        let values = self
            .values
            .iter()
            .map(|v| Scalar::Bool(pattern.is_match(&v.to_string())))
            .collect();
        Some(Self::new(values, self.index.clone()))
    }
}

/// Named columns plus row identities; `x`, `y`, `z` are the coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct RowStructure {
    pub columns: Vec<(String, Vec<Scalar>)>,
    pub index: Vec<usize>,
}

impl RowStructure {
    pub fn new(columns: Vec<(&str, Vec<Scalar>)>) -> Self {
        let rows = columns.first().map_or(0, |(_, v)| v.len());
        Self {
            columns: columns
                .into_iter()
                .map(|(name, values)| (name.to_string(), values))
                .collect(),
            index: (0..rows).collect(),
        }
    }

    fn column(&self, name: &str) -> Option<&Vec<Scalar>> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn coordinates(&self) -> Vec<[f64; 3]> {
        let axis = |name: &str| -> Vec<f64> {
            self.column(name)
                .map(|v| v.iter().map(|s| s.as_f64().unwrap_or(f64::NAN)).collect())
                .unwrap_or_else(|| vec![f64::NAN; self.index.len()])
        };
        let (x, y, z) = (axis("x"), axis("y"), axis("z"));
        (0..self.index.len()).map(|i| [x[i], y[i], z[i]]).collect()
    }
}

impl Structure for RowStructure {
    type Array = RowArray;

    fn len(&self) -> usize {
        self.index.len()
    }

    fn columns(&self) -> Vec<String> {
        self.columns.iter().map(|(n, _)| n.clone()).collect()
    }

    fn get_property(&self, key: &str) -> Option<RowArray> {
        if key == "index" {
            let values = self.index.iter().map(|&i| Scalar::Int(i as i64)).collect();
            return Some(RowArray::new(values, self.index.clone()));
        }
        self.column(key)
            .map(|values| RowArray::new(values.clone(), self.index.clone()))
    }

    fn select(&self, mask: &RowArray) -> Self {
        let keep: Vec<bool> = mask.bools();
        let filter = |values: &Vec<Scalar>| -> Vec<Scalar> {
            values
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| v.clone())
                .collect()
        };
        Self {
            columns: self
                .columns
                .iter()
                .map(|(n, v)| (n.clone(), filter(v)))
                .collect(),
            index: self
                .index
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(i, _)| *i)
                .collect(),
        }
    }

    fn minimum_pairwise_distances(&self, other: &Self) -> RowArray {
        let targets = other.coordinates();
        let values = self
            .coordinates()
            .iter()
            .map(|p| {
                let min = targets
                    .iter()
                    .map(|q| {
                        ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2) + (p[2] - q[2]).powi(2))
                            .sqrt()
                    })
                    .fold(f64::INFINITY, f64::min);
                Scalar::Float(min)
            })
            .collect();
        RowArray::new(values, self.index.clone())
    }

    fn array_filled(&self, value: Scalar) -> RowArray {
        RowArray::new(vec![value; self.index.len()], self.index.clone())
    }

    fn array_values(&self, values: Vec<Scalar>) -> RowArray {
        RowArray::new(values, self.index.clone())
    }
}

/// Eight atoms: an alanine and a glycine, a heme iron and two waters
pub fn sample() -> RowStructure {
    let s = |v: &[&str]| v.iter().map(|x| Scalar::from(*x)).collect::<Vec<_>>();
    let i = |v: &[i64]| v.iter().map(|x| Scalar::Int(*x)).collect::<Vec<_>>();
    let f = |v: &[f64]| v.iter().map(|x| Scalar::Float(*x)).collect::<Vec<_>>();
    RowStructure::new(vec![
        ("name", s(&["N", "CA", "CB", "N", "CA", "FE", "O", "O"])),
        ("resname", s(&["ALA", "ALA", "ALA", "GLY", "GLY", "HEM", "HOH", "HOH"])),
        ("resid", i(&[1, 1, 1, 2, 2, 3, 4, 5])),
        ("element", s(&["N", "C", "C", "N", "C", "FE", "O", "O"])),
        ("chain", s(&["A", "A", "A", "A", "A", "B", "W", "W"])),
        ("x", f(&[0.0, 1.5, 2.0, 3.0, 4.5, 10.0, 20.0, 4.0])),
        ("y", f(&[0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 3.0])),
        ("z", f(&[0.0; 8])),
    ])
}
