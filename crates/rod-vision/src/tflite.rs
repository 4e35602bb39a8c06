use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage};
use std::{
    ffi::CString,
    os::raw::{c_char, c_int, c_void},
    path::Path,
    ptr,
};
use tracing::{info, warn};

use crate::engine::{EngineLoader, EngineOptions, InferenceEngine, InputShape, OutputShape};

#[repr(C)]
struct TfLiteModel;
#[repr(C)]
struct TfLiteInterpreterOptions;
#[repr(C)]
struct TfLiteInterpreter;
#[repr(C)]
struct TfLiteTensor;
#[repr(C)]
struct TfLiteDelegate;

// TfLiteType values from tensorflow/lite/c/c_api_types.h
const K_TFLITE_FLOAT32: c_int = 1;
const K_TFLITE_UINT8: c_int = 3;

#[link(name = "tensorflowlite_c")]
extern "C" {
    fn TfLiteModelCreateFromFile(model_path: *const c_char) -> *mut TfLiteModel;
    fn TfLiteModelDelete(model: *mut TfLiteModel);

    fn TfLiteInterpreterOptionsCreate() -> *mut TfLiteInterpreterOptions;
    fn TfLiteInterpreterOptionsDelete(options: *mut TfLiteInterpreterOptions);
    fn TfLiteInterpreterOptionsSetNumThreads(
        options: *mut TfLiteInterpreterOptions,
        num_threads: c_int,
    );
    #[cfg_attr(not(feature = "edgetpu"), allow(dead_code))]
    fn TfLiteInterpreterOptionsAddDelegate(
        options: *mut TfLiteInterpreterOptions,
        delegate: *mut TfLiteDelegate,
    );

    fn TfLiteInterpreterCreate(
        model: *const TfLiteModel,
        options: *const TfLiteInterpreterOptions,
    ) -> *mut TfLiteInterpreter;
    fn TfLiteInterpreterDelete(interpreter: *mut TfLiteInterpreter);

    fn TfLiteInterpreterAllocateTensors(interpreter: *mut TfLiteInterpreter) -> c_int;
    fn TfLiteInterpreterInvoke(interpreter: *mut TfLiteInterpreter) -> c_int;

    fn TfLiteInterpreterGetInputTensor(
        interpreter: *mut TfLiteInterpreter,
        index: c_int,
    ) -> *mut TfLiteTensor;
    fn TfLiteInterpreterGetOutputTensor(
        interpreter: *mut TfLiteInterpreter,
        index: c_int,
    ) -> *const TfLiteTensor;

    fn TfLiteTensorType(tensor: *const TfLiteTensor) -> c_int;
    fn TfLiteTensorData(tensor: *const TfLiteTensor) -> *mut c_void;
    fn TfLiteTensorByteSize(tensor: *const TfLiteTensor) -> usize;

    fn TfLiteTensorNumDims(tensor: *const TfLiteTensor) -> c_int;
    fn TfLiteTensorDim(tensor: *const TfLiteTensor, dim_index: c_int) -> c_int;
}

#[cfg(feature = "edgetpu")]
#[link(name = "edgetpu")]
extern "C" {
    fn edgetpu_create_delegate(
        device_type: c_int,
        device_path: *const c_char,
        options: *const c_char,
    ) -> *mut TfLiteDelegate;
    fn edgetpu_free_delegate(delegate: *mut TfLiteDelegate);
}

/// TFLite C API backend. Expects NHWC RGB input and a `[1, channels, anchors]` f32 output.
pub struct TfliteEngine {
    model: *mut TfLiteModel,
    opts: *mut TfLiteInterpreterOptions,
    interp: *mut TfLiteInterpreter,
    #[cfg(feature = "edgetpu")]
    delegate: Option<*mut TfLiteDelegate>,
    input: InputShape,
    output: OutputShape,
    input_type: c_int,
}

// The raw handles are only touched through &mut self.
unsafe impl Send for TfliteEngine {}

impl TfliteEngine {
    pub fn new(model_path: &Path, engine_opts: &EngineOptions) -> Result<Self> {
        let cpath = CString::new(model_path.to_string_lossy().as_bytes())?;
        let model = unsafe { TfLiteModelCreateFromFile(cpath.as_ptr()) };
        anyhow::ensure!(!model.is_null(), "failed to load tflite model: {}", model_path.display());

        // from here on Drop releases whatever was created if a later step fails
        let mut engine = Self {
            model,
            opts: ptr::null_mut(),
            interp: ptr::null_mut(),
            #[cfg(feature = "edgetpu")]
            delegate: None,
            input: InputShape { width: 0, height: 0 },
            output: OutputShape { channels: 0, elements: 0 },
            input_type: 0,
        };

        engine.opts = unsafe { TfLiteInterpreterOptionsCreate() };
        anyhow::ensure!(!engine.opts.is_null(), "failed to create tflite options");
        let threads = engine_opts.threads.max(1) as c_int;
        unsafe { TfLiteInterpreterOptionsSetNumThreads(engine.opts, threads) };

        if engine_opts.use_acceleration {
            engine.attach_accelerator();
        }

        engine.interp = unsafe { TfLiteInterpreterCreate(engine.model, engine.opts) };
        anyhow::ensure!(!engine.interp.is_null(), "failed to create tflite interpreter");
        let status = unsafe { TfLiteInterpreterAllocateTensors(engine.interp) };
        anyhow::ensure!(status == 0, "tensor allocation returned status {}", status);

        let (input, output) = (engine.input_tensor()?, engine.output_tensor()?);
        let in_dims = tensor_dims(input);
        engine.input = match in_dims.as_slice() {
            [1, h, w, 3] => InputShape { width: *w as u32, height: *h as u32 },
            other => anyhow::bail!("unexpected input dims {:?}, expected [1, H, W, 3]", other),
        };
        let out_dims = tensor_dims(output);
        engine.output = match out_dims.as_slice() {
            [1, c, n] => OutputShape { channels: *c as usize, elements: *n as usize },
            other => anyhow::bail!("unexpected output dims {:?}, expected [1, C, N]", other),
        };
        engine.input_type = unsafe { TfLiteTensorType(input) };
        anyhow::ensure!(
            engine.input_type == K_TFLITE_FLOAT32 || engine.input_type == K_TFLITE_UINT8,
            "unsupported input tensor type {} (float32 and uint8 are supported)",
            engine.input_type
        );

        info!(
            "tflite: loaded {} input={:?} output={:?} threads={}",
            model_path.display(),
            in_dims,
            out_dims,
            engine_opts.threads
        );
        Ok(engine)
    }

    #[cfg(feature = "edgetpu")]
    fn attach_accelerator(&mut self) {
        let delegate = unsafe { edgetpu_create_delegate(0, ptr::null(), ptr::null()) };
        if delegate.is_null() {
            warn!("tflite: EdgeTPU delegate unavailable, running on CPU");
            return;
        }
        unsafe { TfLiteInterpreterOptionsAddDelegate(self.opts, delegate) };
        self.delegate = Some(delegate);
    }

    #[cfg(not(feature = "edgetpu"))]
    fn attach_accelerator(&mut self) {
        warn!("tflite: acceleration requested but built without edgetpu support, running on CPU");
    }

    fn input_tensor(&self) -> Result<*mut TfLiteTensor> {
        let t = unsafe { TfLiteInterpreterGetInputTensor(self.interp, 0) };
        anyhow::ensure!(!t.is_null(), "model has no input tensor");
        Ok(t)
    }

    fn output_tensor(&self) -> Result<*const TfLiteTensor> {
        let t = unsafe { TfLiteInterpreterGetOutputTensor(self.interp, 0) };
        anyhow::ensure!(!t.is_null(), "model has no output tensor");
        Ok(t)
    }

    /// Human readable tensor layout, for `rod inspect`.
    pub fn inspect(&self) -> Result<String> {
        let (input, output) = (self.input_tensor()?, self.output_tensor()?);
        let (in_bytes, out_bytes) =
            unsafe { (TfLiteTensorByteSize(input), TfLiteTensorByteSize(output)) };
        Ok(format!(
            concat!(
                "model tensors:\n",
                "  input  dims={:?} type={} bytes={} ({}x{} RGB)\n",
                "  output dims={:?} bytes={} ({} classes x {} anchors)\n",
            ),
            tensor_dims(input),
            self.input_type,
            in_bytes,
            self.input.width,
            self.input.height,
            tensor_dims(output),
            out_bytes,
            self.output.channels.saturating_sub(4),
            self.output.elements
        ))
    }

    fn write_input(&mut self, image: &DynamicImage) -> Result<()> {
        let rgb = image.to_rgb8();
        let resized = image::imageops::resize(
            &rgb,
            self.input.width,
            self.input.height,
            FilterType::Triangle,
        );
        let pixels = resized.as_raw();

        let tensor = self.input_tensor()?;
        let (capacity, dst) = unsafe { (TfLiteTensorByteSize(tensor), TfLiteTensorData(tensor)) };
        anyhow::ensure!(!dst.is_null(), "input tensor has no buffer");

        if self.input_type == K_TFLITE_FLOAT32 {
            let need = pixels.len() * std::mem::size_of::<f32>();
            anyhow::ensure!(
                capacity >= need,
                "input buffer holds {} bytes, frame needs {}",
                capacity,
                need
            );
            let floats = unsafe { std::slice::from_raw_parts_mut(dst as *mut f32, pixels.len()) };
            for (f, p) in floats.iter_mut().zip(pixels) {
                *f = *p as f32 / 255.0;
            }
        } else {
            anyhow::ensure!(
                capacity >= pixels.len(),
                "input buffer holds {} bytes, frame needs {}",
                capacity,
                pixels.len()
            );
            unsafe {
                ptr::copy_nonoverlapping(pixels.as_ptr(), dst as *mut u8, pixels.len());
            }
        }
        Ok(())
    }
}

impl InferenceEngine for TfliteEngine {
    fn input_shape(&self) -> InputShape {
        self.input
    }

    fn output_shape(&self) -> OutputShape {
        self.output
    }

    fn run(&mut self, image: &DynamicImage) -> Result<Vec<f32>> {
        self.write_input(image).context("prepare input tensor")?;

        let status = unsafe { TfLiteInterpreterInvoke(self.interp) };
        anyhow::ensure!(status == 0, "interpreter invoke returned status {}", status);

        let tensor = self.output_tensor()?;
        let src = unsafe { TfLiteTensorData(tensor) as *const f32 };
        anyhow::ensure!(!src.is_null(), "output tensor has no buffer");

        let available = unsafe { TfLiteTensorByteSize(tensor) } / std::mem::size_of::<f32>();
        let need = self.output.channels * self.output.elements;
        anyhow::ensure!(available >= need, "output holds {} floats, expected {}", available, need);
        Ok(unsafe { std::slice::from_raw_parts(src, need) }.to_vec())
    }
}

/// Loader for [`crate::ObstaclePipeline::setup`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TfliteLoader;

impl EngineLoader for TfliteLoader {
    fn load(&self, model_path: &Path, opts: &EngineOptions) -> Result<Box<dyn InferenceEngine>> {
        Ok(Box::new(TfliteEngine::new(model_path, opts)?))
    }
}

fn tensor_dims(t: *const TfLiteTensor) -> Vec<i32> {
    let rank = unsafe { TfLiteTensorNumDims(t) };
    (0..rank).map(|i| unsafe { TfLiteTensorDim(t, i) }).collect()
}

impl Drop for TfliteEngine {
    fn drop(&mut self) {
        // interpreter first; it borrows the model and the delegate
        unsafe {
            if !self.interp.is_null() {
                TfLiteInterpreterDelete(self.interp);
            }
            if !self.opts.is_null() {
                TfLiteInterpreterOptionsDelete(self.opts);
            }
            if !self.model.is_null() {
                TfLiteModelDelete(self.model);
            }
            #[cfg(feature = "edgetpu")]
            if let Some(delegate) = self.delegate.take() {
                edgetpu_free_delegate(delegate);
            }
        }
    }
}
