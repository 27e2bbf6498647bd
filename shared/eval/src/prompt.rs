use egret_data_provider::{ImageRef, Sample};

use crate::traits::GenerationTask;
use crate::EvalError;

/// Placeholder the templates embed where an image is attended.
pub const IMAGE_TOKEN: &str = "<image>";

/// Marker closing one in-context demonstration.
pub const END_OF_EXAMPLE: &str = "<|endofchunk|>";

/// One fully-assembled model input: the image sequence and the interleaved
/// prompt text.
#[derive(Clone, Debug, PartialEq)]
pub struct Prompt {
    pub images: Vec<ImageRef>,
    pub text: String,
}

/// Builds the prompt for one query: demonstration contexts in order, then the
/// query's answer-less template.
///
/// When the *requested* shot count is zero, two demonstrations are still
/// supplied (see [`crate::effective_shots`]) but only their text survives:
/// their images are excluded and every image placeholder is stripped from the
/// demonstration text, while reference text and end-of-example markers stay.
/// The query keeps its image and its own placeholder.
pub fn assemble_prompt(
    task: &dyn GenerationTask,
    demos: &[Sample],
    query: &Sample,
    requested_shots: usize,
) -> Result<Prompt, EvalError> {
    let mut images: Vec<ImageRef> = if requested_shots > 0 {
        demos.iter().map(|demo| demo.image.clone()).collect()
    } else {
        Vec::new()
    };
    images.push(query.image.clone());

    let mut context = String::new();
    for demo in demos {
        context.push_str(&task.demo_context(demo)?);
    }
    if requested_shots == 0 {
        context = context.replace(IMAGE_TOKEN, "");
    }

    let text = format!("{context}{}", task.query_context(query)?);
    Ok(Prompt { images, text })
}
