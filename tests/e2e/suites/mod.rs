mod motorcycle_pipeline;
mod rental_lifecycle;
