//! ONNX Runtime encoder for sentence-transformers models.
//!
//! The model directory must contain `model.onnx` and `tokenizer.json`
//! (e.g. all-MiniLM-L6-v2, 384 dimensions). Embeddings are mean-pooled over
//! the attention mask and L2-normalized.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, Tokenizer};
use tracing::info;

use crate::encoder::{TextEncoder, normalize};

/// Longest input the encoder sees, in model tokens.
const MAX_TOKENS: usize = 256;

/// Sentence encoder backed by an ONNX Runtime session.
///
/// `Session::run` needs exclusive access, so the session sits behind a mutex
/// and concurrent requests take turns.
pub struct OnnxEncoder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dim: usize,
    name: String,
}

impl OnnxEncoder {
    /// Load a model from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let (session, tokenizer) = load_model(model_dir, MAX_TOKENS)?;

        // Last output dimension is the embedding size.
        let dim = infer_dim(session.outputs()[0].dtype()).unwrap_or(384);
        let name = model_name(model_dir);

        info!(dim, model = %model_dir.display(), "loaded embedding model");
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dim,
            name,
        })
    }
}

impl TextEncoder for OnnxEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn encode_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        let inputs = ModelInputs::new(&encodings);
        let (batch_size, seq_len) = (inputs.batch_size, inputs.seq_len);

        // Token embeddings: [batch_size, seq_len, dim].
        let (dims, output_data) = inputs.run(&self.session)?;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size && dims[2] as usize == self.dim,
            "unexpected output shape: {dims:?}, expected [{batch_size}, {seq_len}, {}]",
            self.dim
        );
        let actual_seq_len = dims[1] as usize;

        let mut embeddings = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut pooled = vec![0.0f32; self.dim];
            let mut token_count = 0.0f32;

            for j in 0..actual_seq_len.min(seq_len) {
                let mask_val = inputs.attention_mask[i * seq_len + j] as f32;
                if mask_val > 0.0 {
                    let offset = (i * actual_seq_len + j) * self.dim;
                    for (d, p) in pooled.iter_mut().enumerate() {
                        *p += output_data[offset + d] * mask_val;
                    }
                    token_count += mask_val;
                }
            }

            if token_count > 0.0 {
                for p in &mut pooled {
                    *p /= token_count;
                }
            }
            normalize(&mut pooled);
            embeddings.push(pooled);
        }

        Ok(embeddings)
    }
}

/// Open `model.onnx` and `tokenizer.json` from a model directory. The tokenizer
/// truncates to `max_tokens` and pads batches to their longest member.
pub(crate) fn load_model(model_dir: &Path, max_tokens: usize) -> anyhow::Result<(Session, Tokenizer)> {
    let model_path = model_dir.join("model.onnx");
    let tokenizer_path = model_dir.join("tokenizer.json");

    anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
    anyhow::ensure!(
        tokenizer_path.exists(),
        "tokenizer.json not found in {model_dir:?}"
    );

    let session = Session::builder()?.commit_from_file(&model_path)?;

    let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
    tokenizer
        .with_truncation(Some(tokenizers::TruncationParams {
            max_length: max_tokens,
            ..Default::default()
        }))
        .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;
    tokenizer.with_padding(Some(tokenizers::PaddingParams {
        ..Default::default()
    }));

    Ok((session, tokenizer))
}

pub(crate) fn model_name(model_dir: &Path) -> String {
    model_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "onnx".to_string())
}

/// Flat `[batch_size, seq_len]` inputs for a BERT-style model.
pub(crate) struct ModelInputs {
    pub batch_size: usize,
    pub seq_len: usize,
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

impl ModelInputs {
    pub(crate) fn new(encodings: &[Encoding]) -> Self {
        let batch_size = encodings.len();
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + j] = mask as i64;
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[offset + j] = tid as i64;
            }
        }

        Self {
            batch_size,
            seq_len,
            input_ids,
            attention_mask,
            token_type_ids,
        }
    }

    /// Run the session and copy out the first output as `(shape, data)`.
    pub(crate) fn run(&self, session: &Mutex<Session>) -> anyhow::Result<(Vec<i64>, Vec<f32>)> {
        let shape = [self.batch_size as i64, self.seq_len as i64];
        let ids_tensor = Tensor::from_array((shape, self.input_ids.clone().into_boxed_slice()))?;
        let mask_tensor =
            Tensor::from_array((shape, self.attention_mask.clone().into_boxed_slice()))?;
        let type_tensor =
            Tensor::from_array((shape, self.token_type_ids.clone().into_boxed_slice()))?;

        let mut session = session
            .lock()
            .map_err(|_| anyhow::anyhow!("onnx session mutex poisoned"))?;
        let outputs = session.run(ort::inputs![
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
            "token_type_ids" => type_tensor,
        ])?;

        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        Ok((dims.to_vec(), output_data.to_vec()))
    }
}

fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::cosine;
    use std::path::PathBuf;

    fn model_dir() -> Option<PathBuf> {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("all-MiniLM-L6-v2");
        dir.join("model.onnx").exists().then_some(dir)
    }

    #[test]
    fn missing_model_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxEncoder::load(dir.path()).err().unwrap();
        assert!(err.to_string().contains("model.onnx not found"));
    }

    #[test]
    fn embeds_when_model_present() {
        // Download model.onnx and tokenizer.json into models/all-MiniLM-L6-v2 to run this.
        let Some(dir) = model_dir() else {
            return;
        };
        let encoder = OnnxEncoder::load(&dir).unwrap();
        let vecs = encoder
            .encode_batch(&[
                "workplace health and safety",
                "control of substances hazardous to health",
                "income tax legislation",
            ])
            .unwrap();
        assert_eq!(vecs.len(), 3);
        for v in &vecs {
            assert_eq!(v.len(), encoder.dim());
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4);
        }
        assert!(cosine(&vecs[0], &vecs[1]) > cosine(&vecs[0], &vecs[2]));
    }
}
