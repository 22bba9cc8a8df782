//! LightGBM C API 핸들 래퍼
//!
//! `lightgbm3`의 안전한 API는 데이터셋 파라미터(범주형 열, bin 수)와 평가 데이터셋을
//! 받지 않으므로 학습과 기여도 계산은 `lightgbm3-sys`를 직접 호출한다.
//! 핸들은 Drop에서 해제된다.

use std::ffi::{c_void, CStr, CString};
use std::ptr;

use lightgbm3_sys as sys;
use ndarray::ArrayView2;
use serde_json::Value;

use crate::error::{BoostError, BoostResult};

fn check(operation: &str, code: i32) -> BoostResult<()> {
    if code == 0 {
        return Ok(());
    }
    // SAFETY: LGBM_GetLastError는 항상 NUL 종료 문자열을 돌려준다
    let reason = unsafe { CStr::from_ptr(sys::LGBM_GetLastError()) }
        .to_string_lossy()
        .into_owned();
    Err(BoostError::native(operation, reason))
}

fn c_string(operation: &str, text: &str) -> BoostResult<CString> {
    CString::new(text).map_err(|e| BoostError::native(operation, e))
}

fn dimension(operation: &str, value: usize) -> BoostResult<i32> {
    i32::try_from(value).map_err(|e| BoostError::native(operation, e))
}

/// JSON 파라미터 객체를 LightGBM의 `key=value key=value` 문자열로 바꾼다
pub(crate) fn param_string(params: &Value) -> String {
    match params.as_object() {
        Some(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(text) => format!("{}={}", key, text),
                other => format!("{}={}", key, other),
            })
            .collect::<Vec<_>>()
            .join(" "),
        None => String::new(),
    }
}

/// LightGBM 모델 텍스트는 특징 이름을 공백으로 구분하므로 구분자와 JSON 특수문자를 치환한다
pub(crate) fn sanitize_feature_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            c if c.is_whitespace() => '_',
            ',' | ':' | '"' | '[' | ']' | '{' | '}' => '_',
            c => c,
        })
        .collect()
}

pub(crate) struct NativeDataset {
    handle: sys::DatasetHandle,
}

impl NativeDataset {
    /// 행 우선 f64 행렬과 타깃으로 데이터셋을 만든다.
    /// `reference`가 있으면 그 데이터셋의 bin 경계를 공유한다 (평가 구간용).
    pub fn from_matrix(
        features: ArrayView2<f64>,
        target: &[f64],
        params: &str,
        reference: Option<&NativeDataset>,
    ) -> BoostResult<Self> {
        let flat: Vec<f64> = features.iter().copied().collect();
        let n_rows = dimension("LGBM_DatasetCreateFromMat", features.nrows())?;
        let n_cols = dimension("LGBM_DatasetCreateFromMat", features.ncols())?;
        let params = c_string("LGBM_DatasetCreateFromMat", params)?;
        let reference = reference.map_or(ptr::null_mut(), |r| r.handle);

        let mut handle: sys::DatasetHandle = ptr::null_mut();
        // SAFETY: flat은 n_rows × n_cols 행 우선 버퍼이며 호출 동안 살아있다
        check("LGBM_DatasetCreateFromMat", unsafe {
            sys::LGBM_DatasetCreateFromMat(
                flat.as_ptr() as *const c_void,
                sys::C_API_DTYPE_FLOAT64 as i32,
                n_rows,
                n_cols,
                1,
                params.as_ptr(),
                reference,
                &mut handle,
            )
        })?;
        let dataset = Self { handle };

        let label: Vec<f32> = target.iter().map(|&v| v as f32).collect();
        let field = c_string("LGBM_DatasetSetField", "label")?;
        check("LGBM_DatasetSetField", unsafe {
            sys::LGBM_DatasetSetField(
                dataset.handle,
                field.as_ptr(),
                label.as_ptr() as *const c_void,
                n_rows,
                sys::C_API_DTYPE_FLOAT32 as i32,
            )
        })?;

        Ok(dataset)
    }

    pub fn set_feature_names(&self, names: &[String]) -> BoostResult<()> {
        let names = names
            .iter()
            .map(|name| c_string("LGBM_DatasetSetFeatureNames", &sanitize_feature_name(name)))
            .collect::<BoostResult<Vec<_>>>()?;
        let mut pointers: Vec<*const std::os::raw::c_char> =
            names.iter().map(|name| name.as_ptr()).collect();
        let count = dimension("LGBM_DatasetSetFeatureNames", pointers.len())?;
        // SAFETY: pointers는 names가 소유한 CString을 가리킨다
        check("LGBM_DatasetSetFeatureNames", unsafe {
            sys::LGBM_DatasetSetFeatureNames(self.handle, pointers.as_mut_ptr(), count)
        })
    }
}

impl Drop for NativeDataset {
    fn drop(&mut self) {
        // SAFETY: handle은 LGBM_DatasetCreateFromMat가 만든 유일한 소유 핸들
        unsafe {
            sys::LGBM_DatasetFree(self.handle);
        }
    }
}

pub(crate) struct NativeBooster {
    handle: sys::BoosterHandle,
}

impl NativeBooster {
    pub fn new(train: &NativeDataset, params: &str) -> BoostResult<Self> {
        let params = c_string("LGBM_BoosterCreate", params)?;
        let mut handle: sys::BoosterHandle = ptr::null_mut();
        check("LGBM_BoosterCreate", unsafe {
            sys::LGBM_BoosterCreate(train.handle, params.as_ptr(), &mut handle)
        })?;
        Ok(Self { handle })
    }

    pub fn from_model_text(text: &str) -> BoostResult<Self> {
        let text = c_string("LGBM_BoosterLoadModelFromString", text)?;
        let mut iterations = 0;
        let mut handle: sys::BoosterHandle = ptr::null_mut();
        check("LGBM_BoosterLoadModelFromString", unsafe {
            sys::LGBM_BoosterLoadModelFromString(text.as_ptr(), &mut iterations, &mut handle)
        })?;
        Ok(Self { handle })
    }

    /// 평가 데이터셋 등록. 등록 순서대로 data_idx 1, 2, ...
    pub fn add_valid(&mut self, valid: &NativeDataset) -> BoostResult<()> {
        check("LGBM_BoosterAddValidData", unsafe {
            sys::LGBM_BoosterAddValidData(self.handle, valid.handle)
        })
    }

    /// 트리 하나를 추가한다. 더 나눌 분기가 없으면 true
    pub fn update(&mut self) -> BoostResult<bool> {
        let mut finished = 0;
        check("LGBM_BoosterUpdateOneIter", unsafe {
            sys::LGBM_BoosterUpdateOneIter(self.handle, &mut finished)
        })?;
        Ok(finished == 1)
    }

    pub fn current_iteration(&self) -> BoostResult<usize> {
        let mut iteration = 0;
        check("LGBM_BoosterGetCurrentIteration", unsafe {
            sys::LGBM_BoosterGetCurrentIteration(self.handle, &mut iteration)
        })?;
        Ok(iteration.max(0) as usize)
    }

    /// data_idx 데이터셋의 현재 지표 값 (0 = 학습, 1 = 첫 평가 데이터셋)
    pub fn eval(&self, data_idx: i32) -> BoostResult<Vec<f64>> {
        let mut count = 0;
        check("LGBM_BoosterGetEvalCounts", unsafe {
            sys::LGBM_BoosterGetEvalCounts(self.handle, &mut count)
        })?;
        let mut results = vec![0.0f64; count.max(0) as usize];
        let mut written = 0;
        check("LGBM_BoosterGetEval", unsafe {
            sys::LGBM_BoosterGetEval(self.handle, data_idx, &mut written, results.as_mut_ptr())
        })?;
        results.truncate(written.max(0) as usize);
        Ok(results)
    }

    /// 앞에서부터 `num_iteration`개 반복만 담은 모델 텍스트 (-1이면 전체)
    pub fn save_model_text(&self, num_iteration: i32) -> BoostResult<String> {
        let importance = sys::C_API_FEATURE_IMPORTANCE_GAIN as i32;
        let mut buffer = vec![0u8; 1 << 16];
        let mut needed: i64 = 0;
        check("LGBM_BoosterSaveModelToString", unsafe {
            sys::LGBM_BoosterSaveModelToString(
                self.handle,
                0,
                num_iteration,
                importance,
                buffer.len() as i64,
                &mut needed,
                buffer.as_mut_ptr() as *mut std::os::raw::c_char,
            )
        })?;
        if needed as usize > buffer.len() {
            buffer = vec![0u8; needed as usize];
            check("LGBM_BoosterSaveModelToString", unsafe {
                sys::LGBM_BoosterSaveModelToString(
                    self.handle,
                    0,
                    num_iteration,
                    importance,
                    buffer.len() as i64,
                    &mut needed,
                    buffer.as_mut_ptr() as *mut std::os::raw::c_char,
                )
            })?;
        }

        CStr::from_bytes_until_nul(&buffer)
            .map(|text| text.to_string_lossy().into_owned())
            .map_err(|e| BoostError::native("LGBM_BoosterSaveModelToString", e))
    }

    /// 행별 TreeSHAP 기여도. 행마다 특징 수 + 1개 값이며 마지막 값이 기대값
    pub fn predict_contributions(&self, x: ArrayView2<f64>, params: &str) -> BoostResult<Vec<f64>> {
        let flat: Vec<f64> = x.iter().copied().collect();
        let n_rows = dimension("LGBM_BoosterPredictForMat", x.nrows())?;
        let n_cols = dimension("LGBM_BoosterPredictForMat", x.ncols())?;
        let params = c_string("LGBM_BoosterPredictForMat", params)?;
        let mut output = vec![0.0f64; x.nrows() * (x.ncols() + 1)];
        let mut written: i64 = 0;

        check("LGBM_BoosterPredictForMat", unsafe {
            sys::LGBM_BoosterPredictForMat(
                self.handle,
                flat.as_ptr() as *const c_void,
                sys::C_API_DTYPE_FLOAT64 as i32,
                n_rows,
                n_cols,
                1,
                sys::C_API_PREDICT_CONTRIB as i32,
                0,
                -1,
                params.as_ptr(),
                &mut written,
                output.as_mut_ptr(),
            )
        })?;
        output.truncate(written.max(0) as usize);
        Ok(output)
    }
}

impl Drop for NativeBooster {
    fn drop(&mut self) {
        // SAFETY: handle은 이 구조체만 소유한다
        unsafe {
            sys::LGBM_BoosterFree(self.handle);
        }
    }
}
