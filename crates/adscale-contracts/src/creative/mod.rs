mod analysis;
mod carousel;
mod config;
mod copy;
mod formats;

pub use analysis::{CreativeAnalysis, KeyElements};
pub use carousel::{
    CarouselConfig, CarouselContent, CarouselGoal, CarouselOptimizations, CarouselSlot,
    CarouselStyle, MAX_CARD_COUNT, MIN_CARD_COUNT,
};
pub use config::{CreativeMode, EvolutionType, GenerationConfig, ImagePayload, ResolutionTier};
pub use copy::AdCopy;
pub use formats::{AspectRatio, RequestedFormat};
